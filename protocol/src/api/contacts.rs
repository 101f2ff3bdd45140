//! Contact-form API DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Contact message for POST /api/contacts/messages/
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContactMessage {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}
