//! Contact-form submission

use reqwest::Method;
use validator::Validate;

use parq_protocol::ContactMessage;

use crate::client::ApiClient;
use crate::error::Result;

/// Contacts service
pub struct ContactsService {
    client: ApiClient,
}

impl ContactsService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn send(&self, message: ContactMessage) -> Result<()> {
        message.validate()?;
        let _: serde_json::Value = self
            .client
            .request(Method::POST, "/contacts/messages/", Some(&message))
            .await?;
        Ok(())
    }
}
