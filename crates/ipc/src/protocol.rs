//! Wire types for daemon communication
//!
//! Newline-delimited JSON: each line is one request or one response.
//! Requests are discriminated by a `type` field and may carry an optional
//! `request_id`, which the daemon echoes back so a client can pair
//! responses with requests without relying on arrival order.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use taskdeck_store::{Priority, TaskStatus};

/// One request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Optional correlation id, echoed in the response when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub op: RequestOp,
}

impl Request {
    /// Wrap an operation with a fresh correlation id.
    pub fn new(op: RequestOp) -> Self {
        Self {
            request_id: Some(uuid::Uuid::new_v4().to_string()),
            op,
        }
    }

    /// Wrap an operation without a correlation id.
    pub fn bare(op: RequestOp) -> Self {
        Self {
            request_id: None,
            op,
        }
    }
}

/// The request catalog. Field names on the wire are camelCase
/// (`boardId`, `dueDate`, `includeArchived`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestOp {
    #[serde(rename = "ping")]
    Ping,

    #[serde(rename = "boards:list", rename_all = "camelCase")]
    BoardsList {
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        include_archived: bool,
    },
    #[serde(rename = "boards:get")]
    BoardsGet { id: i64 },
    #[serde(rename = "boards:create")]
    BoardsCreate {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "boards:update")]
    BoardsUpdate {
        id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archived: Option<bool>,
    },
    #[serde(rename = "boards:delete")]
    BoardsDelete { id: i64 },

    #[serde(rename = "tasks:list", rename_all = "camelCase")]
    TasksList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        board_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<TaskStatus>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        include_archived: bool,
    },
    #[serde(rename = "tasks:get")]
    TasksGet { id: i64 },
    #[serde(rename = "tasks:create", rename_all = "camelCase")]
    TasksCreate {
        board_id: i64,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<TaskStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_date: Option<NaiveDate>,
    },
    #[serde(rename = "tasks:update", rename_all = "camelCase")]
    TasksUpdate {
        id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<TaskStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
        /// Absent = untouched; explicit `null` = clear the date.
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "double_option"
        )]
        due_date: Option<Option<NaiveDate>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archived: Option<bool>,
    },
    #[serde(rename = "tasks:delete")]
    TasksDelete { id: i64 },
    #[serde(rename = "tasks:move")]
    TasksMove {
        id: i64,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<i64>,
    },
}

/// Keeps an explicit `null` distinguishable from an absent field.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// One response line: `{"ok":true,"data":…}` or `{"ok":false,"error":…}`,
/// plus the echoed `request_id` when the request carried one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Create a success response
    pub fn success(data: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            request_id: None,
            ok: true,
            data: Some(serde_json::to_value(data)?),
            error: None,
        })
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            request_id: None,
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Get the data payload, or the error message if the response failed
    pub fn into_result(self) -> Result<serde_json::Value, String> {
        if self.ok {
            Ok(self.data.unwrap_or(serde_json::Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "Unknown error".to_string()))
        }
    }

    /// Serialize as a wire line, terminated by exactly one newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_request_op_round_trips() {
        let ops = vec![
            RequestOp::Ping,
            RequestOp::BoardsList {
                include_archived: true,
            },
            RequestOp::BoardsGet { id: 1 },
            RequestOp::BoardsCreate {
                name: "Work".into(),
                description: Some("day job".into()),
            },
            RequestOp::BoardsUpdate {
                id: 1,
                name: Some("Job".into()),
                description: None,
                archived: Some(true),
            },
            RequestOp::BoardsDelete { id: 1 },
            RequestOp::TasksList {
                board_id: Some(1),
                status: Some(TaskStatus::Doing),
                include_archived: false,
            },
            RequestOp::TasksGet { id: 2 },
            RequestOp::TasksCreate {
                board_id: 1,
                title: "Fix bug".into(),
                description: None,
                status: Some(TaskStatus::Todo),
                priority: Some(Priority::High),
                due_date: NaiveDate::from_ymd_opt(2026, 9, 1),
            },
            RequestOp::TasksUpdate {
                id: 2,
                title: None,
                description: Some("crash".into()),
                status: None,
                priority: None,
                due_date: Some(None),
                archived: None,
            },
            RequestOp::TasksDelete { id: 2 },
            RequestOp::TasksMove {
                id: 2,
                status: TaskStatus::Done,
                position: Some(0),
            },
        ];
        for op in ops {
            let request = Request::new(op.clone());
            let encoded = serde_json::to_string(&request).unwrap();
            let decoded: Request = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded.op, op, "round trip failed for {encoded}");
            assert_eq!(decoded.request_id, request.request_id);
        }
    }

    #[test]
    fn bare_catalog_requests_parse_without_request_id() {
        let decoded: Request =
            serde_json::from_str(r#"{"type":"tasks:move","id":5,"status":"done"}"#).unwrap();
        assert_eq!(decoded.request_id, None);
        assert_eq!(
            decoded.op,
            RequestOp::TasksMove {
                id: 5,
                status: TaskStatus::Done,
                position: None,
            }
        );
    }

    #[test]
    fn wire_fields_are_camel_case() {
        let request = Request::bare(RequestOp::TasksCreate {
            board_id: 3,
            title: "Fix bug".into(),
            description: None,
            status: None,
            priority: None,
            due_date: NaiveDate::from_ymd_opt(2026, 9, 1),
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "tasks:create");
        assert_eq!(value["boardId"], 3);
        assert_eq!(value["dueDate"], "2026-09-01");
        assert!(value.get("board_id").is_none());
    }

    #[test]
    fn update_distinguishes_null_due_date_from_absent() {
        let cleared: Request =
            serde_json::from_str(r#"{"type":"tasks:update","id":1,"dueDate":null}"#).unwrap();
        let RequestOp::TasksUpdate { due_date, .. } = cleared.op else {
            panic!("wrong variant");
        };
        assert_eq!(due_date, Some(None));

        let untouched: Request =
            serde_json::from_str(r#"{"type":"tasks:update","id":1}"#).unwrap();
        let RequestOp::TasksUpdate { due_date, .. } = untouched.op else {
            panic!("wrong variant");
        };
        assert_eq!(due_date, None);
    }

    #[test]
    fn unknown_type_error_names_the_type() {
        let err = serde_json::from_str::<Request>(r#"{"type":"tasks:frobnicate"}"#).unwrap_err();
        assert!(err.to_string().contains("tasks:frobnicate"));
    }

    #[test]
    fn response_lines_end_with_exactly_one_newline() {
        let ok = Response::success(json!({"pong": true}))
            .unwrap()
            .to_line()
            .unwrap();
        assert!(ok.ends_with('\n') && !ok.ends_with("\n\n"));

        let err = Response::error("Task not found: 5").to_line().unwrap();
        assert_eq!(err, "{\"ok\":false,\"error\":\"Task not found: 5\"}\n");
    }

    #[test]
    fn response_echoes_request_id() {
        let response = Response::success(json!({}))
            .unwrap()
            .with_request_id(Some("abc".into()));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["request_id"], "abc");

        let bare = Response::error("nope");
        let value = serde_json::to_value(&bare).unwrap();
        assert!(value.get("request_id").is_none());
    }

    #[test]
    fn into_result_splits_ok_and_error() {
        let ok = Response::success(json!({"n": 1})).unwrap();
        assert_eq!(ok.into_result().unwrap()["n"], 1);

        let err = Response::error("boom");
        assert_eq!(err.into_result().unwrap_err(), "boom");
    }
}
