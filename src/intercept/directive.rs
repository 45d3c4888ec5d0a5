//! Cross-context control directives.
//!
//! `{ arm: true, durationMs: n }` arms the capture window, `{ reset: true }`
//! clears the learned filter. Anything else is ordinary message traffic.

use serde::{Deserialize, Serialize};

use crate::extract::{PayloadNode, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Directive {
    Arm {
        #[serde(rename = "durationMs")]
        duration_ms: Option<f64>,
    },
    Reset,
}

impl Directive {
    /// Recognize a directive in a message payload. Only keyed top-level
    /// entries are consulted; `arm` wins over `reset` when both are set.
    pub fn parse<N: PayloadNode>(payload: &N) -> Option<Directive> {
        if payload.scalar().is_some() {
            return None;
        }

        let mut arm = false;
        let mut reset = false;
        let mut duration_ms = None;
        payload.for_each_entry(&mut |key, value| {
            let Some(key) = key else { return };
            match (key, value.scalar()) {
                ("arm", Some(Scalar::Bool(true))) => arm = true,
                ("reset", Some(Scalar::Bool(true))) => reset = true,
                ("durationMs", Some(Scalar::Number(n))) if n.is_finite() => duration_ms = Some(n),
                ("durationMs", Some(Scalar::Text(s))) => {
                    duration_ms = s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
                }
                _ => {}
            }
        });

        if arm {
            Some(Directive::Arm { duration_ms })
        } else if reset {
            Some(Directive::Reset)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SharedPayload;
    use serde_json::json;

    #[test]
    fn test_arm_with_duration() {
        let d = Directive::parse(&json!({"arm": true, "durationMs": 8000}));
        assert_eq!(d, Some(Directive::Arm { duration_ms: Some(8000.0) }));
    }

    #[test]
    fn test_arm_duration_missing_or_garbage() {
        assert_eq!(
            Directive::parse(&json!({"arm": true})),
            Some(Directive::Arm { duration_ms: None })
        );
        assert_eq!(
            Directive::parse(&json!({"arm": true, "durationMs": "soon"})),
            Some(Directive::Arm { duration_ms: None })
        );
        assert_eq!(
            Directive::parse(&json!({"arm": true, "durationMs": "2500"})),
            Some(Directive::Arm { duration_ms: Some(2500.0) })
        );
    }

    #[test]
    fn test_reset() {
        assert_eq!(Directive::parse(&json!({"reset": true})), Some(Directive::Reset));
    }

    #[test]
    fn test_ordinary_traffic_is_not_a_directive() {
        assert_eq!(Directive::parse(&json!({"arm": "yes"})), None);
        assert_eq!(Directive::parse(&json!({"checkIn": "2024-03-01"})), None);
        assert_eq!(Directive::parse(&json!([{"arm": true}])), None);
        assert_eq!(Directive::parse(&json!("arm")), None);
    }

    #[test]
    fn test_shared_payload() {
        let msg = SharedPayload::new_map();
        msg.insert("reset", SharedPayload::Bool(true));
        assert_eq!(Directive::parse(&msg), Some(Directive::Reset));
    }
}
