use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCitation {
    pub page_number: u32,
    pub text_snippet: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedField<T> {
    pub value: T,
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
}

impl<T> ExtractedField<T> {
    pub fn new(value: T, confidence: Confidence) -> Self {
        Self {
            value,
            confidence: Some(confidence),
            sources: Vec::new(),
        }
    }

    pub fn cited(mut self, page_number: u32, text_snippet: &str) -> Self {
        self.sources.push(SourceCitation {
            page_number,
            text_snippet: text_snippet.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductibleKind {
    Annual,
    PerIncident,
    Lifetime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deductible {
    pub amount: f64,
    pub kind: DeductibleKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "lowercase")]
pub enum AnnualLimit {
    Capped(f64),
    Unlimited,
}

/// Waiting periods in days.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingPeriods {
    pub accident: Option<ExtractedField<u32>>,
    pub illness: Option<ExtractedField<u32>>,
    pub orthopedic: Option<ExtractedField<u32>>,
    pub cruciate_ligament: Option<ExtractedField<u32>>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeLimits {
    pub minimum_weeks: Option<u32>,
    pub maximum_enrollment_years: Option<u32>,
}

/// Structured summary produced by an external extraction step. This crate
/// never computes one; it only validates and stores what it is handed.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySummary {
    pub policy_name: Option<ExtractedField<String>>,
    pub insurer_name: Option<ExtractedField<String>>,
    pub deductible: Option<ExtractedField<Deductible>>,
    /// Percentage of eligible costs reimbursed after the deductible.
    pub reimbursement_rate: Option<ExtractedField<u8>>,
    pub annual_limit: Option<ExtractedField<AnnualLimit>>,
    pub waiting_periods: WaitingPeriods,
    pub covered_conditions: Vec<ExtractedField<String>>,
    pub exclusions: Vec<ExtractedField<String>>,
    pub age_limits: Option<ExtractedField<AgeLimits>>,
    pub pre_existing_conditions: Option<ExtractedField<String>>,
}

impl PolicySummary {
    pub fn example() -> Self {
        Self {
            policy_name: Some(
                ExtractedField::new("Complete Accident & Illness".to_string(), Confidence::High)
                    .cited(1, "Complete Accident & Illness Policy"),
            ),
            insurer_name: Some(ExtractedField::new(
                "Example Pet Mutual".to_string(),
                Confidence::High,
            )),
            deductible: Some(
                ExtractedField::new(
                    Deductible {
                        amount: 250.0,
                        kind: DeductibleKind::Annual,
                    },
                    Confidence::High,
                )
                .cited(3, "An annual deductible of $250 applies"),
            ),
            reimbursement_rate: Some(
                ExtractedField::new(80, Confidence::High)
                    .cited(3, "we reimburse 80% of eligible veterinary costs"),
            ),
            annual_limit: Some(ExtractedField::new(
                AnnualLimit::Capped(10_000.0),
                Confidence::Medium,
            )),
            waiting_periods: WaitingPeriods {
                accident: Some(ExtractedField::new(2, Confidence::High).cited(4, "2 days for accidents")),
                illness: Some(ExtractedField::new(14, Confidence::High).cited(4, "14 days for illnesses")),
                orthopedic: Some(ExtractedField::new(180, Confidence::Medium)),
                cruciate_ligament: Some(
                    ExtractedField::new(180, Confidence::Low)
                        .cited(5, "cruciate ligament conditions after six months"),
                ),
            },
            covered_conditions: vec![
                ExtractedField::new("Accidents and injuries".to_string(), Confidence::High),
                ExtractedField::new("Hereditary conditions".to_string(), Confidence::Medium)
                    .cited(6, "hereditary and congenital conditions are covered"),
            ],
            exclusions: vec![
                ExtractedField::new("Pre-existing conditions".to_string(), Confidence::High)
                    .cited(8, "We do not cover pre-existing conditions"),
                ExtractedField::new("Cosmetic procedures".to_string(), Confidence::High),
            ],
            age_limits: Some(ExtractedField::new(
                AgeLimits {
                    minimum_weeks: Some(8),
                    maximum_enrollment_years: Some(14),
                },
                Confidence::Medium,
            )),
            pre_existing_conditions: Some(ExtractedField::new(
                "Conditions showing signs before the end of the waiting period are excluded"
                    .to_string(),
                Confidence::Medium,
            )),
        }
    }

    /// Returns a list of human-readable problems; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some(rate) = &self.reimbursement_rate {
            if rate.value > 100 {
                problems.push(format!("reimbursementRate {} exceeds 100", rate.value));
            }
        }
        if let Some(deductible) = &self.deductible {
            if deductible.value.amount < 0.0 || deductible.value.amount.is_nan() {
                problems.push("deductible amount must be non-negative".to_string());
            }
        }
        if let Some(limit) = &self.annual_limit {
            if let AnnualLimit::Capped(amount) = limit.value {
                if amount < 0.0 || amount.is_nan() {
                    problems.push("annualLimit amount must be non-negative".to_string());
                }
            }
        }

        let zero_page = self.citations().any(|citation| citation.page_number == 0);
        if zero_page {
            problems.push("citation pageNumber must be at least 1".to_string());
        }

        problems
    }

    fn citations(&self) -> impl Iterator<Item = &SourceCitation> {
        let waiting = &self.waiting_periods;
        let singles = [
            self.policy_name.as_ref().map(|f| &f.sources),
            self.insurer_name.as_ref().map(|f| &f.sources),
            self.deductible.as_ref().map(|f| &f.sources),
            self.reimbursement_rate.as_ref().map(|f| &f.sources),
            self.annual_limit.as_ref().map(|f| &f.sources),
            waiting.accident.as_ref().map(|f| &f.sources),
            waiting.illness.as_ref().map(|f| &f.sources),
            waiting.orthopedic.as_ref().map(|f| &f.sources),
            waiting.cruciate_ligament.as_ref().map(|f| &f.sources),
            self.age_limits.as_ref().map(|f| &f.sources),
            self.pre_existing_conditions.as_ref().map(|f| &f.sources),
        ];

        singles
            .into_iter()
            .flatten()
            .chain(self.covered_conditions.iter().map(|f| &f.sources))
            .chain(self.exclusions.iter().map(|f| &f.sources))
            .flatten()
    }
}
