use crate::pipeline::Pipeline;
use crate::router::{Action, Endpoint, Router};
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use shared::http::{ResponseBody, make_error_response, make_json_response, make_text_response};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type ResponseFuture = Pin<Box<dyn Future<Output = Response<ResponseBody>> + Send + 'static>>;

/// HTTP front of the [`Pipeline`]. Failures are logged and answered with a
/// generic 500.
pub struct NotifierService {
    pipeline: Arc<Pipeline>,
    router: Router,
}

impl NotifierService {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        NotifierService {
            pipeline,
            router: Router::new(),
        }
    }

    pub fn handle<B>(&self, req: &Request<B>) -> ResponseFuture {
        let endpoint = self.router.resolve(req);
        let pipeline = self.pipeline.clone();

        Box::pin(async move {
            match endpoint {
                Some(endpoint) => respond(&pipeline, endpoint).await,
                None => make_error_response(StatusCode::NOT_FOUND),
            }
        })
    }
}

async fn respond(pipeline: &Pipeline, endpoint: Endpoint) -> Response<ResponseBody> {
    let Endpoint {
        action,
        job,
        build,
        channel,
    } = endpoint;

    match action {
        Action::Get => match pipeline.build_message(&job, &build).await {
            Ok(message) => match serde_json::to_vec(&message) {
                Ok(json) => make_json_response(json),
                Err(e) => {
                    tracing::error!(error = %e, "could not serialize message");
                    make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
                }
            },
            Err(e) => {
                tracing::error!(job = %job, build = %build, error = %e, "could not build message");
                make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        },
        Action::Notify => match pipeline.notify(&job, &build, channel.as_deref()).await {
            Ok(_) => make_text_response(StatusCode::OK, "OK"),
            Err(e) => {
                tracing::error!(
                    job = %job,
                    build = %build,
                    error = %e,
                    "could not send notification"
                );
                make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        },
    }
}

impl Service<Request<Incoming>> for NotifierService {
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let response = self.handle(&req);
        Box::pin(async move { Ok(response.await) })
    }
}
