use serde::{Deserialize, Serialize};

/// A progress milestone template that mentors assign to students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PhaseTemplate {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub purpose: String,
    pub default_order: i32,
    pub is_active: bool,
    #[serde(default)]
    pub suggested_duration_days: Option<u32>,
    // Decimal columns arrive as strings
    #[serde(default)]
    pub default_min_accuracy: Option<String>,
    #[serde(default)]
    pub default_min_completion: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePhaseTemplate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub purpose: String,
    pub default_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_duration_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_min_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_min_completion: Option<f64>,
}

/// Partial update; unset fields are left untouched by the backend.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhaseTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_duration_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_min_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_min_completion: Option<f64>,
}

impl UpdatePhaseTemplate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.purpose.is_none()
            && self.default_order.is_none()
            && self.is_active.is_none()
            && self.suggested_duration_days.is_none()
            && self.default_min_accuracy.is_none()
            && self.default_min_completion.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTemplateResponse {
    pub phase_template: PhaseTemplate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTemplatesResponse {
    pub phase_templates: Vec<PhaseTemplate>,
}
