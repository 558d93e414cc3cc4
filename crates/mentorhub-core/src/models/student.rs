use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "emailVerified", default)]
    pub email_verified: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub role: Role,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl Student {
    pub fn is_verified(&self) -> bool {
        self.email_verified.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
}

impl Pagination {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentsResponse {
    pub students: Vec<Student>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_students_page() {
        let json = r#"{"students":[{"id":"s1","name":"Caio","email":"caio@example.com","emailVerified":null,"avatar":null,"role":"STUDENT","isActive":true,"createdAt":"2025-03-01","updatedAt":"2025-03-02"}],"pagination":{"total":11,"page":1,"limit":10,"totalPages":2}}"#;
        let page: StudentsResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(page.students.len(), 1);
        assert!(!page.students[0].is_verified());
        assert!(page.pagination.has_next());
    }
}
