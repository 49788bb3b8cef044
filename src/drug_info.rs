// src/drug_info.rs
//
// Drug lookups pass through the openFDA drug-label API. Nothing is
// persisted; responses are flattened into compact summaries for the client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum DrugInfoError {
    #[error("drug lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("no drug information found")]
    NotFound,
    #[error("drug database rejected query: HTTP {0}")]
    Upstream(u16),
}

#[derive(Clone)]
pub struct DrugInfoClient {
    client: reqwest::Client,
    base_url: String,
}

/* -------------------------
   openFDA label payload
--------------------------*/

#[derive(Debug, Deserialize)]
struct LabelResponse {
    #[serde(default)]
    results: Vec<LabelResult>,
}

#[derive(Debug, Default, Deserialize)]
struct LabelResult {
    #[serde(default)]
    openfda: OpenFda,
    #[serde(default)]
    purpose: Vec<String>,
    #[serde(default)]
    indications_and_usage: Vec<String>,
    #[serde(default)]
    dosage_and_administration: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    boxed_warning: Vec<String>,
    #[serde(default)]
    adverse_reactions: Vec<String>,
    #[serde(default)]
    active_ingredient: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenFda {
    #[serde(default)]
    brand_name: Vec<String>,
    #[serde(default)]
    generic_name: Vec<String>,
    #[serde(default)]
    manufacturer_name: Vec<String>,
    #[serde(default)]
    product_type: Vec<String>,
    #[serde(default)]
    route: Vec<String>,
}

/* -------------------------
   Flattened summaries
--------------------------*/

#[derive(Debug, Serialize)]
pub struct DrugSummary {
    pub brand_name: String,
    pub generic_name: String,
    pub manufacturer: String,
    pub purpose: String,
    pub dosage: String,
    pub warnings: String,
    pub side_effects: String,
    pub active_ingredients: String,
    pub product_type: String,
    pub route: String,
}

#[derive(Debug, Serialize)]
pub struct DrugAlternative {
    pub brand_name: String,
    pub generic_name: String,
    pub manufacturer: String,
    pub route: String,
}

fn first_or_na(values: &[String]) -> String {
    values.first().cloned().unwrap_or_else(|| "N/A".into())
}

/// First entry of `primary`, falling back to `secondary`, then "N/A".
/// Label sections are inconsistently populated across manufacturers.
fn first_of(primary: &[String], secondary: &[String]) -> String {
    primary
        .first()
        .or_else(|| secondary.first())
        .cloned()
        .unwrap_or_else(|| "N/A".into())
}

fn summary_from_label(label: &LabelResult) -> DrugSummary {
    DrugSummary {
        brand_name: first_or_na(&label.openfda.brand_name),
        generic_name: first_or_na(&label.openfda.generic_name),
        manufacturer: first_or_na(&label.openfda.manufacturer_name),
        purpose: first_of(&label.purpose, &label.indications_and_usage),
        dosage: first_or_na(&label.dosage_and_administration),
        warnings: first_of(&label.warnings, &label.boxed_warning),
        side_effects: first_or_na(&label.adverse_reactions),
        active_ingredients: first_or_na(&label.active_ingredient),
        product_type: first_or_na(&label.openfda.product_type),
        route: first_or_na(&label.openfda.route),
    }
}

fn alternative_from_label(label: &LabelResult) -> DrugAlternative {
    DrugAlternative {
        brand_name: first_or_na(&label.openfda.brand_name),
        generic_name: first_or_na(&label.openfda.generic_name),
        manufacturer: first_or_na(&label.openfda.manufacturer_name),
        route: first_or_na(&label.openfda.route),
    }
}

/// Match either the brand or the generic name.
fn search_query(drug_name: &str) -> String {
    format!(r#"(openfda.brand_name:"{drug_name}" OR openfda.generic_name:"{drug_name}")"#)
}

impl DrugInfoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_labels(&self, search: &str, limit: u32) -> Result<Vec<LabelResult>, DrugInfoError> {
        let url = format!("{}/drug/label.json", self.base_url);
        let limit = limit.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[("search", search), ("limit", limit.as_str())])
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await?;

        // openFDA answers an empty result set with 404.
        if resp.status().as_u16() == 404 {
            return Err(DrugInfoError::NotFound);
        }
        if !resp.status().is_success() {
            return Err(DrugInfoError::Upstream(resp.status().as_u16()));
        }

        let body: LabelResponse = resp.json().await?;
        if body.results.is_empty() {
            return Err(DrugInfoError::NotFound);
        }
        Ok(body.results)
    }

    /// Look a drug up by brand or generic name, top 5 labels.
    pub async fn search(&self, drug_name: &str) -> Result<Vec<DrugSummary>, DrugInfoError> {
        let labels = self.fetch_labels(&search_query(drug_name), 5).await?;
        Ok(labels.iter().map(summary_from_label).collect())
    }

    /// Resolve the drug's generic name, then list other labels sharing it.
    pub async fn alternatives(
        &self,
        drug_name: &str,
    ) -> Result<(String, Vec<DrugAlternative>), DrugInfoError> {
        let labels = self
            .fetch_labels(&format!(r#"openfda.brand_name:"{drug_name}""#), 1)
            .await?;

        let generic = labels
            .first()
            .and_then(|l| l.openfda.generic_name.first())
            .cloned()
            .ok_or(DrugInfoError::NotFound)?;

        let alt_labels = self
            .fetch_labels(&format!(r#"openfda.generic_name:"{generic}""#), 10)
            .await?;

        let alternatives = alt_labels.iter().map(alternative_from_label).collect();
        Ok((generic, alternatives))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(json: serde_json::Value) -> LabelResult {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn search_query_matches_brand_or_generic() {
        assert_eq!(
            search_query("aspirin"),
            r#"(openfda.brand_name:"aspirin" OR openfda.generic_name:"aspirin")"#
        );
    }

    #[test]
    fn summary_flattens_first_entries() {
        let s = summary_from_label(&label(serde_json::json!({
            "openfda": {
                "brand_name": ["Tylenol"],
                "generic_name": ["acetaminophen"],
                "manufacturer_name": ["Kenvue"],
                "product_type": ["HUMAN OTC DRUG"],
                "route": ["ORAL"]
            },
            "purpose": ["Pain reliever"],
            "dosage_and_administration": ["take 2 tablets every 6 hours"],
            "warnings": ["Liver warning"],
            "adverse_reactions": ["nausea"],
            "active_ingredient": ["Acetaminophen 500 mg"]
        })));
        assert_eq!(s.brand_name, "Tylenol");
        assert_eq!(s.generic_name, "acetaminophen");
        assert_eq!(s.purpose, "Pain reliever");
        assert_eq!(s.warnings, "Liver warning");
        assert_eq!(s.route, "ORAL");
    }

    #[test]
    fn missing_sections_fall_back_to_na() {
        let s = summary_from_label(&label(serde_json::json!({})));
        assert_eq!(s.brand_name, "N/A");
        assert_eq!(s.purpose, "N/A");
        assert_eq!(s.side_effects, "N/A");
    }

    #[test]
    fn purpose_falls_back_to_indications() {
        let s = summary_from_label(&label(serde_json::json!({
            "indications_and_usage": ["for temporary relief of headache"]
        })));
        assert_eq!(s.purpose, "for temporary relief of headache");
    }

    #[test]
    fn warnings_fall_back_to_boxed_warning() {
        let s = summary_from_label(&label(serde_json::json!({
            "boxed_warning": ["WARNING: serious risk"]
        })));
        assert_eq!(s.warnings, "WARNING: serious risk");
    }

    #[test]
    fn empty_label_response_deserializes() {
        let resp: LabelResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(resp.results.is_empty());
    }
}
