//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes. Every error carries a
//! `data` object with the stability flag and, when the host printed
//! anything, its raw output.

use hostward_core::error::AppError;
use hostward_core::port::ExecFailure;
use jsonrpsee::types::ErrorObjectOwned;
use serde::Serialize;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const STATE_ERROR: i32 = 4004;
    pub const CONNECTION_ERROR: i32 = 4010;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const CONFIG_ERROR: i32 = 5003;
}

#[derive(Debug, Serialize)]
struct ErrorData {
    stable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

pub fn error_code(err: &AppError) -> i32 {
    match err {
        AppError::Validation(_) => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Conflict(_) => code::CONFLICT,
        AppError::State(_) => code::STATE_ERROR,
        AppError::Connection(_) => code::CONNECTION_ERROR,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Config(_) => code::CONFIG_ERROR,
        AppError::Io(_) | AppError::Serialization(_) | AppError::Internal(_) => {
            code::INTERNAL_ERROR
        }
    }
}

fn rpc_error(err: AppError, output: Option<String>) -> ErrorObjectOwned {
    let data = ErrorData {
        stable: err.is_stable(),
        output,
    };
    ErrorObjectOwned::owned(error_code(&err), err.to_string(), Some(data))
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    rpc_error(err, None)
}

/// Convert a failed remote operation, keeping what the host printed
pub fn failure_to_rpc_error(failure: ExecFailure) -> ErrorObjectOwned {
    let output = Some(failure.output).filter(|o| !o.is_empty());
    rpc_error(failure.error, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostward_core::error::StateError;

    #[test]
    fn test_codes() {
        let cases = [
            (AppError::Validation("v".into()), code::VALIDATION_ERROR),
            (AppError::NotFound("n".into()), code::NOT_FOUND),
            (AppError::Conflict("c".into()), code::CONFLICT),
            (
                AppError::State(StateError::BackupDirNotExists("/backup/a.backup".into())),
                code::STATE_ERROR,
            ),
            (AppError::Connection("x".into()), code::CONNECTION_ERROR),
            (AppError::Database("d".into()), code::DB_ERROR),
            (AppError::Config("c".into()), code::CONFIG_ERROR),
            (AppError::Internal("i".into()), code::INTERNAL_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(to_rpc_error(err).code(), expected);
        }
    }

    #[test]
    fn test_data_carries_stability_and_output() {
        let failure = ExecFailure::new(
            "useradd: user 'bob' already exists\n",
            AppError::Connection("command exited with status 9".into()),
        );
        let err = failure_to_rpc_error(failure);
        let data: serde_json::Value =
            serde_json::from_str(err.data().unwrap().get()).unwrap();
        assert_eq!(data["stable"], true);
        assert_eq!(data["output"], "useradd: user 'bob' already exists\n");

        let err = to_rpc_error(AppError::Database("locked".into()));
        let data: serde_json::Value =
            serde_json::from_str(err.data().unwrap().get()).unwrap();
        assert_eq!(data["stable"], false);
        assert!(data.get("output").is_none());
    }

    #[test]
    fn test_empty_output_is_omitted() {
        let err = failure_to_rpc_error(ExecFailure::local(AppError::Validation("bad".into())));
        let data: serde_json::Value =
            serde_json::from_str(err.data().unwrap().get()).unwrap();
        assert!(data.get("output").is_none());
    }
}
