use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A classification attached to one page of a logical document.
///
/// Keyed by global page number so that part boundaries never
/// desynchronize a tag from its visual page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageTag {
    pub document_id: String,
    pub global_page_number: u32,
    pub tag_value: String,
    pub updated_at: NaiveDateTime,
}

impl PageTag {
    pub fn new(
        document_id: impl Into<String>,
        global_page_number: u32,
        tag_value: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            global_page_number,
            tag_value: tag_value.into(),
            updated_at: chrono::Local::now().naive_local(),
        }
    }
}
