use async_trait::async_trait;
use std::sync::Arc;

pub type ContractAddress = String;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("contract execution reverted: {0}")]
    Reverted(String),
    #[error("backend failure: {0}")]
    Backend(String),
}

/// One contract execution as handed to the wallet or connection.
///
/// `method_args` is the already validated JSON argument object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecuteRequest {
    pub contract_address: ContractAddress,
    pub method_name: String,
    pub method_args: String,
}

/// The single capability both a direct wallet and an established wallet
/// connection provide: run a contract function and hand back its raw result.
///
/// The raw result is the JSON text the contract produced. A contract-level
/// failure must come back as [`ExecutorError::Reverted`].
#[async_trait]
pub trait ContractExecutor: Send + Sync {
    async fn execute(&self, request: ExecuteRequest) -> Result<String, ExecutorError>;
}

#[async_trait]
impl<T> ContractExecutor for Arc<T>
where
    T: ContractExecutor + ?Sized,
{
    async fn execute(&self, request: ExecuteRequest) -> Result<String, ExecutorError> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<'a, T> ContractExecutor for &'a T
where
    T: ContractExecutor + ?Sized,
{
    async fn execute(&self, request: ExecuteRequest) -> Result<String, ExecutorError> {
        (**self).execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl ContractExecutor for Fixed {
        async fn execute(&self, _request: ExecuteRequest) -> Result<String, ExecutorError> {
            Ok(self.0.to_string())
        }
    }

    fn request() -> ExecuteRequest {
        ExecuteRequest {
            contract_address: "addr-1".to_string(),
            method_name: "list_tables".to_string(),
            method_args: "{}".to_string(),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn shared_and_borrowed_executors_expected_delegate() {
        let inner = Fixed("[]");
        let borrowed = &inner;
        assert_eq!(borrowed.execute(request()).await.expect("borrowed"), "[]");

        let shared: Arc<dyn ContractExecutor> = Arc::new(Fixed("7"));
        assert_eq!(shared.execute(request()).await.expect("shared"), "7");
    }

    #[test]
    fn executor_error_rejected_expected_message() {
        let error = ExecutorError::Rejected {
            status: 401,
            body: "missing session".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "request rejected with status 401: missing session"
        );
    }
}
