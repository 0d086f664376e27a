//! Compatibility data model: the immutable request, the ten scoring dimensions,
//! and the aggregated analysis handed back to callers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Request
// ────────────────────────────────────────────────────────────────────────────

/// Input to one compatibility analysis. Built once per call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityRequest {
    pub job: JobPosting,
    pub candidate: CandidateProfile,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkArrangement {
    Remote,
    Hybrid,
    OnSite,
    #[default]
    Unspecified,
}

impl WorkArrangement {
    pub fn label(&self) -> &'static str {
        match self {
            WorkArrangement::Remote => "Remote",
            WorkArrangement::Hybrid => "Hybrid",
            WorkArrangement::OnSite => "On-site",
            WorkArrangement::Unspecified => "Not specified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    /// Identity in the job store. Part of the cache key.
    pub id: String,
    pub title: String,
    pub company: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub work_arrangement: WorkArrangement,
    #[serde(default)]
    pub salary_min: Option<u32>,
    #[serde(default)]
    pub salary_max: Option<u32>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: String,
    /// Explicit profile version from the profile store. When absent the cache
    /// falls back to a content fingerprint.
    #[serde(default)]
    pub profile_version: Option<String>,
    pub full_name: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub work_experience: Vec<WorkExperience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<SkillEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    pub start_date: NaiveDate,
    /// `None` for a current position.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub accomplishments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    #[serde(default)]
    pub field_of_study: Option<String>,
    #[serde(default)]
    pub graduation_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proficiency {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    #[serde(default)]
    pub proficiency: Option<Proficiency>,
    #[serde(default)]
    pub years_of_experience: Option<f32>,
}

// ────────────────────────────────────────────────────────────────────────────
// Dimensions
// ────────────────────────────────────────────────────────────────────────────

/// The ten fixed scoring criteria. Declaration order is the rubric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    SkillMatch,
    IndustryMatch,
    ExperienceLevel,
    LocationMatch,
    SeniorityLevel,
    EducationCertification,
    SoftSkillsLeadership,
    EmploymentStability,
    GrowthPotential,
    CompanyScaleAlignment,
}

impl Dimension {
    pub const ALL: [Dimension; 10] = [
        Dimension::SkillMatch,
        Dimension::IndustryMatch,
        Dimension::ExperienceLevel,
        Dimension::LocationMatch,
        Dimension::SeniorityLevel,
        Dimension::EducationCertification,
        Dimension::SoftSkillsLeadership,
        Dimension::EmploymentStability,
        Dimension::GrowthPotential,
        Dimension::CompanyScaleAlignment,
    ];

    /// JSON key used in the model output contract.
    pub fn key(&self) -> &'static str {
        match self {
            Dimension::SkillMatch => "skillMatch",
            Dimension::IndustryMatch => "industryMatch",
            Dimension::ExperienceLevel => "experienceLevel",
            Dimension::LocationMatch => "locationMatch",
            Dimension::SeniorityLevel => "seniorityLevel",
            Dimension::EducationCertification => "educationCertification",
            Dimension::SoftSkillsLeadership => "softSkillsLeadership",
            Dimension::EmploymentStability => "employmentStability",
            Dimension::GrowthPotential => "growthPotential",
            Dimension::CompanyScaleAlignment => "companyScaleAlignment",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::SkillMatch => "Skill Match",
            Dimension::IndustryMatch => "Industry Match",
            Dimension::ExperienceLevel => "Experience Level",
            Dimension::LocationMatch => "Location Match",
            Dimension::SeniorityLevel => "Seniority Level",
            Dimension::EducationCertification => "Education/Certification",
            Dimension::SoftSkillsLeadership => "Soft Skills & Leadership",
            Dimension::EmploymentStability => "Employment Stability",
            Dimension::GrowthPotential => "Growth Potential",
            Dimension::CompanyScaleAlignment => "Company-Scale Alignment",
        }
    }

    /// Percentage weight in the overall score. All ten sum to 100.
    pub fn weight(&self) -> u32 {
        match self {
            Dimension::SkillMatch => 30,
            Dimension::IndustryMatch => 15,
            Dimension::ExperienceLevel => 20,
            Dimension::LocationMatch => 10,
            Dimension::SeniorityLevel => 5,
            Dimension::EducationCertification => 5,
            Dimension::SoftSkillsLeadership => 5,
            Dimension::EmploymentStability => 5,
            Dimension::GrowthPotential => 3,
            Dimension::CompanyScaleAlignment => 2,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Score (1–10) and justification for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionResult {
    pub score: u8,
    pub justification: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Recommendation
// ────────────────────────────────────────────────────────────────────────────

/// Ordered recommendation categories, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Poor Match")]
    Poor,
    #[serde(rename = "Weak Match")]
    Weak,
    #[serde(rename = "Moderate Match")]
    Moderate,
    #[serde(rename = "Good Match")]
    Good,
    #[serde(rename = "Strong Match")]
    Strong,
}

impl Recommendation {
    pub const ALL: [Recommendation; 5] = [
        Recommendation::Poor,
        Recommendation::Weak,
        Recommendation::Moderate,
        Recommendation::Good,
        Recommendation::Strong,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::Poor => "Poor Match",
            Recommendation::Weak => "Weak Match",
            Recommendation::Moderate => "Moderate Match",
            Recommendation::Good => "Good Match",
            Recommendation::Strong => "Strong Match",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.label() == label)
    }

    /// Fixed partition of 0–100. A boundary value belongs to the higher band.
    pub fn from_score(overall: u8) -> Self {
        match overall {
            80.. => Recommendation::Strong,
            65..=79 => Recommendation::Good,
            50..=64 => Recommendation::Moderate,
            35..=49 => Recommendation::Weak,
            _ => Recommendation::Poor,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis
// ────────────────────────────────────────────────────────────────────────────

/// The validated, aggregated result of one analysis.
///
/// Only `aggregator::build_analysis` constructs one; there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityAnalysis {
    dimensions: BTreeMap<Dimension, DimensionResult>,
    overall_score: u8,
    recommendation: Recommendation,
    strengths: Vec<String>,
    gaps: Vec<String>,
    red_flags: Vec<String>,
}

impl CompatibilityAnalysis {
    pub(super) fn from_parts(
        dimensions: BTreeMap<Dimension, DimensionResult>,
        overall_score: u8,
        recommendation: Recommendation,
        strengths: Vec<String>,
        gaps: Vec<String>,
        red_flags: Vec<String>,
    ) -> Self {
        Self {
            dimensions,
            overall_score,
            recommendation,
            strengths,
            gaps,
            red_flags,
        }
    }

    pub fn dimensions(&self) -> &BTreeMap<Dimension, DimensionResult> {
        &self.dimensions
    }

    pub fn overall_score(&self) -> u8 {
        self.overall_score
    }

    pub fn recommendation(&self) -> Recommendation {
        self.recommendation
    }

    pub fn strengths(&self) -> &[String] {
        &self.strengths
    }

    pub fn gaps(&self) -> &[String] {
        &self.gaps
    }

    pub fn red_flags(&self) -> &[String] {
        &self.red_flags
    }
}
