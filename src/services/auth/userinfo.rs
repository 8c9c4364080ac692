//! Userinfo endpoint client: profile data for access tokens that carry no
//! profile claims.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::identity::Profile;

const USERINFO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum UserInfoError {
    #[error("failed to fetch userinfo: {0}")]
    Request(#[source] reqwest::Error),
    #[error("userinfo endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode userinfo response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[async_trait]
pub trait UserInfoClient: Send + Sync + 'static {
    async fn fetch(&self, access_token: &str) -> Result<Profile, UserInfoError>;
}

#[derive(Debug, Clone)]
pub struct HttpUserInfoClient {
    http: reqwest::Client,
    url: String,
}

impl HttpUserInfoClient {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(USERINFO_TIMEOUT).build()?;
        Ok(Self::with_client(http, url))
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl UserInfoClient for HttpUserInfoClient {
    async fn fetch(&self, access_token: &str) -> Result<Profile, UserInfoError> {
        let resp = self
            .http
            .get(&self.url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(UserInfoError::Request)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UserInfoError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Profile>().await.map_err(UserInfoError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn fetch_sends_the_bearer_token_and_decodes_the_profile() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/userinfo")
            .match_header("authorization", "Bearer abc.def.ghi")
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"sub":"auth0|1","email":"ada@example.com","given_name":"Ada","picture":"https://x"}"#,
            )
            .create_async()
            .await;

        let client =
            HttpUserInfoClient::with_client(reqwest::Client::new(), format!("{}/userinfo", server.url()));
        let profile = client.fetch("abc.def.ghi").await.unwrap();

        assert_eq!(profile.email(), Some("ada@example.com"));
        assert_eq!(profile.explicit_name().as_deref(), Some("Ada"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/userinfo")
            .match_header("authorization", Matcher::Any)
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let client =
            HttpUserInfoClient::with_client(reqwest::Client::new(), format!("{}/userinfo", server.url()));
        let err = client.fetch("t").await.unwrap_err();

        match err {
            UserInfoError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
