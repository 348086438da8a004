//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ferrule::{Error, Filter, Next, Outcome, Request, RequestHead, Response, Status};

/// An append-only log shared between filters and handlers.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// A filter recording `<name>-before` and `<name>-after` around the rest
    /// of the chain.
    pub fn filter(&self, name: &'static str) -> impl Filter {
        let recorder = self.clone();
        move |req: Request, next: Next| {
            let recorder = recorder.clone();
            async move {
                recorder.push(format!("{name}-before"));
                let outcome: Outcome = next.run(req).await;
                recorder.push(format!("{name}-after"));
                outcome
            }
        }
    }
}

pub async fn body_text(res: Response) -> String {
    let bytes = res.into_body().collect().await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The funnel used throughout: `500` with the failure's message.
pub async fn exception_funnel(_head: RequestHead, err: Error) -> Result<Response, Error> {
    Response::builder()
        .status(Status::INTERNAL_SERVER_ERROR)
        .header("my-header", "My-Value")
        .text(format!("An exception occurred: {err}"))
}
