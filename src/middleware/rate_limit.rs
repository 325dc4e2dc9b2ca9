use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

#[derive(Debug)]
struct Window {
    opened: Instant,
    used: u32,
}

/// Fixed one-second window over the public form endpoints. The cap is
/// process-wide, not per-client; this protects the capacity queries,
/// not individual fairness.
#[derive(Clone, Debug)]
pub struct Throttle {
    per_second: u32,
    window: Arc<Mutex<Window>>,
}

impl Throttle {
    pub fn per_second(limit: u32) -> Self {
        Self {
            per_second: limit.max(1),
            window: Arc::new(Mutex::new(Window {
                opened: Instant::now(),
                used: 0,
            })),
        }
    }

    fn admit(&self) -> bool {
        let mut window = self.window.lock().expect("throttle mutex poisoned");
        if window.opened.elapsed() >= Duration::from_secs(1) {
            window.opened = Instant::now();
            window.used = 0;
        }
        if window.used < self.per_second {
            window.used += 1;
            true
        } else {
            false
        }
    }
}

pub async fn throttle_middleware(
    State(throttle): State<Throttle>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !throttle.admit() {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests" })),
        )
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_within_one_window() {
        let throttle = Throttle::per_second(3);
        assert!(throttle.admit());
        assert!(throttle.admit());
        assert!(throttle.admit());
        assert!(!throttle.admit());
    }

    #[test]
    fn zero_limit_still_admits_one() {
        let throttle = Throttle::per_second(0);
        assert!(throttle.admit());
        assert!(!throttle.admit());
    }
}
