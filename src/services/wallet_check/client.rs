use async_trait::async_trait;
use thiserror::Error;

use crate::error::{AppError, InvalidReason};

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("invalid validator url: {0}")]
    Url(#[from] url::ParseError),
    #[error("validator request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("validator answered with status {0}")]
    Status(reqwest::StatusCode),
}

/// Outbound check that a public address is live on the given network.
#[async_trait]
pub trait WalletValidator: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    /// `Ok(false)` means the service answered and the wallet did not pass.
    async fn check(
        &self,
        address: &str,
        network: &str,
        auth_token: &str,
    ) -> Result<bool, ValidatorError>;
}

/// Run the check before any session is opened.
/// A negative answer and a failed call both end as `UnverifiedWallet`.
pub async fn ensure_verified(
    validator: &dyn WalletValidator,
    address: &str,
    network: &str,
    auth_token: &str,
) -> Result<(), AppError> {
    match validator.check(address, network, auth_token).await {
        Ok(true) => {
            tracing::debug!(backend = validator.backend_name(), network, "wallet verified");
            Ok(())
        }
        Ok(false) => {
            tracing::info!(backend = validator.backend_name(), network, "wallet rejected by validator");
            Err(AppError::InvalidArgument(InvalidReason::UnverifiedWallet))
        }
        Err(e) => {
            tracing::warn!(backend = validator.backend_name(), error = %e, "wallet validator call failed");
            Err(AppError::InvalidArgument(InvalidReason::UnverifiedWallet))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Answers every check with a fixed outcome and records what it was asked.
    #[derive(Debug)]
    pub struct StubValidator {
        answer: Option<bool>,
        seen: Mutex<Vec<(String, String, String)>>,
    }

    impl StubValidator {
        pub fn passing() -> Self {
            Self::answering(Some(true))
        }

        pub fn failing() -> Self {
            Self::answering(Some(false))
        }

        /// Every call errors, as if the service were down.
        pub fn unreachable() -> Self {
            Self::answering(None)
        }

        fn answering(answer: Option<bool>) -> Self {
            Self {
                answer,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(String, String, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WalletValidator for StubValidator {
        fn backend_name(&self) -> &'static str {
            "stub"
        }

        async fn check(
            &self,
            address: &str,
            network: &str,
            auth_token: &str,
        ) -> Result<bool, ValidatorError> {
            self.seen.lock().unwrap().push((
                address.to_string(),
                network.to_string(),
                auth_token.to_string(),
            ));
            match self.answer {
                Some(ok) => Ok(ok),
                None => Err(ValidatorError::Status(
                    reqwest::StatusCode::SERVICE_UNAVAILABLE,
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubValidator;
    use super::*;

    #[tokio::test]
    async fn passing_check_is_ok_and_forwards_the_token() {
        let stub = StubValidator::passing();

        ensure_verified(&stub, "bc1qaddr", "bitcoin", "tok")
            .await
            .unwrap();

        assert_eq!(
            stub.calls(),
            vec![("bc1qaddr".into(), "bitcoin".into(), "tok".into())]
        );
    }

    #[tokio::test]
    async fn negative_answer_and_failed_call_look_the_same() {
        for stub in [StubValidator::failing(), StubValidator::unreachable()] {
            let err = ensure_verified(&stub, "bc1qaddr", "bitcoin", "tok")
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                AppError::InvalidArgument(InvalidReason::UnverifiedWallet)
            ));
        }
    }
}
