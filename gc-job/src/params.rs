use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

pub type JobParameters = HashMap<String, Value>;

/// Typed view over the job's parameter map, validated once at startup
/// instead of repeatedly type-asserted wherever a field is read.
#[derive(Debug, Clone)]
pub struct GcJobParams {
    /// Redis URL for the cache the registry front door reads from. Required:
    /// without it the cache-invalidation phase has nothing to connect to.
    pub redis_url_reg: String,
    pub delete_untagged: bool,
    /// Safety window, in hours, an orphan blob or trash row must sit idle
    /// before it's eligible for collection.
    pub time_window: i64,
    pub dry_run: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("missing required parameter: {0}")]
    Missing(&'static str),
    #[error("parameter {key} has the wrong type: expected {expected}")]
    WrongType { key: &'static str, expected: &'static str },
}

const DEFAULT_DELETE_UNTAGGED: bool = true;
const DEFAULT_TIME_WINDOW_HOURS: i64 = 2;
const DEFAULT_DRY_RUN: bool = false;

impl TryFrom<JobParameters> for GcJobParams {
    type Error = ParamsError;

    fn try_from(mut raw: JobParameters) -> Result<Self, Self::Error> {
        let redis_url_reg = match raw.remove("redis_url_reg") {
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(ParamsError::WrongType {
                    key: "redis_url_reg",
                    expected: "string",
                })
            }
            None => return Err(ParamsError::Missing("redis_url_reg")),
        };

        let delete_untagged = match raw.remove("delete_untagged") {
            Some(Value::Bool(b)) => b,
            Some(_) => {
                return Err(ParamsError::WrongType {
                    key: "delete_untagged",
                    expected: "bool",
                })
            }
            None => DEFAULT_DELETE_UNTAGGED,
        };

        let time_window = match raw.remove("time_window") {
            Some(Value::Number(n)) => n.as_i64().ok_or(ParamsError::WrongType {
                key: "time_window",
                expected: "integer",
            })?,
            Some(_) => {
                return Err(ParamsError::WrongType {
                    key: "time_window",
                    expected: "integer",
                })
            }
            None => DEFAULT_TIME_WINDOW_HOURS,
        };
        if time_window < 0 {
            return Err(ParamsError::WrongType {
                key: "time_window",
                expected: "non-negative integer",
            });
        }

        let dry_run = match raw.remove("dry_run") {
            Some(Value::Bool(b)) => b,
            Some(_) => {
                return Err(ParamsError::WrongType {
                    key: "dry_run",
                    expected: "bool",
                })
            }
            None => DEFAULT_DRY_RUN,
        };

        for unknown_key in raw.keys() {
            warn!(key = unknown_key, "ignoring unrecognized GC job parameter");
        }

        Ok(GcJobParams {
            redis_url_reg,
            delete_untagged,
            time_window,
            dry_run,
        })
    }
}
