use serde::{Deserialize, Serialize};

// Body sent with a 429
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Rejection {
    pub msg: String,
}

impl Rejection {
    pub fn too_many_requests() -> Self {
        Self {
            msg: "too many requests".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_body_is_compact() {
        let body = serde_json::to_string(&Rejection::too_many_requests()).unwrap();
        assert_eq!(body, r#"{"msg":"too many requests"}"#);
    }
}
