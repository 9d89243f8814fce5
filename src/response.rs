use serde::Serialize;

/// Success envelope shared by every JSON endpoint:
/// `{"status":"success","message":...,"data":...}`. Errors use the
/// `{"status":"error","message":...}` shape produced by `ApiError`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Envelope {
            status: "success",
            message: None,
            data,
        }
    }

    pub fn with_message(message: &'static str, data: T) -> Self {
        Envelope {
            status: "success",
            message: Some(message),
            data,
        }
    }
}
