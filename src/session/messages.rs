//! One-shot notices carried across a redirect.

use serde::{Deserialize, Serialize};

use super::Session;
use crate::errors::ServiceError;

const MESSAGES_KEY: &str = "_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

pub async fn push(session: &Session, level: Level, text: impl Into<String>) -> Result<(), ServiceError> {
    let mut queued: Vec<FlashMessage> = session.get(MESSAGES_KEY).await?.unwrap_or_default();
    queued.push(FlashMessage {
        level,
        text: text.into(),
    });
    session.insert(MESSAGES_KEY, &queued).await
}

pub async fn success(session: &Session, text: impl Into<String>) -> Result<(), ServiceError> {
    push(session, Level::Success, text).await
}

pub async fn error(session: &Session, text: impl Into<String>) -> Result<(), ServiceError> {
    push(session, Level::Error, text).await
}

/// Drains queued messages. Reading an empty queue leaves the session untouched.
pub async fn take(session: &Session) -> Result<Vec<FlashMessage>, ServiceError> {
    let queued: Option<Vec<FlashMessage>> = session.get(MESSAGES_KEY).await?;
    match queued {
        Some(messages) => {
            session.remove(MESSAGES_KEY).await;
            Ok(messages)
        }
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_drain_in_order() {
        let session = Session::fresh();
        success(&session, "saved").await.unwrap();
        error(&session, "oops").await.unwrap();

        let drained = take(&session).await.unwrap();
        assert_eq!(
            drained,
            vec![
                FlashMessage {
                    level: Level::Success,
                    text: "saved".into()
                },
                FlashMessage {
                    level: Level::Error,
                    text: "oops".into()
                },
            ]
        );
        assert!(take(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_take_does_not_modify_session() {
        let session = Session::fresh();
        assert!(take(&session).await.unwrap().is_empty());
        assert!(!session.is_modified().await);
    }
}
