//! HTTP front end: every request goes through the controller, except the
//! control-channel route.

use std::sync::Arc;

use actix_web::{
  dev::{Server, Service},
  http::StatusCode,
  web::{self, Data},
  App, HttpRequest, HttpResponse, HttpServer,
};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::CacheStorage;
use crate::config::ServerConfig;
use crate::controller::{OfflineCacheController, Routed};
use crate::error::OfflineError;
use crate::event::WorkerEvent;
use crate::http::{is_hop_by_hop, Fetcher, InterceptedRequest, Response};

/// Bind the proxy and return the running server future.
pub fn serve<S: CacheStorage, F: Fetcher>(
  config: &ServerConfig,
  controller: Arc<OfflineCacheController<S, F>>,
  events: UnboundedSender<WorkerEvent>,
) -> Result<Server> {
  let controller = Data::from(controller);
  let events = Data::new(events);
  let settings = config.clone();

  let server = HttpServer::new(move || {
    let controller = controller.clone();
    let events = events.clone();
    let settings = settings.clone();

    App::new()
      .wrap_fn(|req, srv| {
        let method = req.method().clone();
        let path = req.path().to_string();
        let fut = srv.call(req);
        async move {
          let res = fut.await?;
          debug!("{} {} -> {}", method, path, res.status());
          Ok(res)
        }
      })
      .configure(|cfg| configure(cfg, controller, events, &settings))
  })
  .bind(&config.listen)
  .map_err(|e| eyre!("Failed to bind {}: {}", config.listen, e))?
  .run();

  info!("Listening on {}", config.listen);
  Ok(server)
}

/// Register the control route and the intercepting default service.
///
/// Request bodies up to `max_body_bytes` are accepted so pass-through
/// uploads reach the upstream intact.
pub fn configure<S: CacheStorage, F: Fetcher>(
  cfg: &mut web::ServiceConfig,
  controller: Data<OfflineCacheController<S, F>>,
  events: Data<UnboundedSender<WorkerEvent>>,
  settings: &ServerConfig,
) {
  cfg
    .app_data(controller)
    .app_data(events)
    .app_data(Data::new(settings.clone()))
    .app_data(web::PayloadConfig::new(settings.max_body_bytes))
    .route(&settings.control_path, web::post().to(control_message))
    .default_service(web::to(intercept::<S, F>));
}

async fn control_message(
  body: String,
  events: Data<UnboundedSender<WorkerEvent>>,
) -> HttpResponse {
  if events.send(WorkerEvent::Message(body)).is_err() {
    warn!("Lifecycle loop has stopped; dropping control message");
  }
  HttpResponse::Accepted().finish()
}

async fn intercept<S: CacheStorage, F: Fetcher>(
  req: HttpRequest,
  body: web::Bytes,
  controller: Data<OfflineCacheController<S, F>>,
  settings: Data<ServerConfig>,
) -> HttpResponse {
  let request = match intercepted_request(&req, &body, controller.origin()) {
    Ok(request) => request,
    Err(e) => {
      warn!("Rejecting request {}: {}", req.uri(), e);
      return HttpResponse::BadRequest().body(e.to_string());
    }
  };

  match controller.route(&request).await {
    Ok(Routed::Respond(result)) => {
      debug!("{} served from {}", request.url, result.source);
      to_http_response(&result.data)
    }
    Ok(Routed::Passthrough)
      if !settings.forward_proxy && request.origin() != controller.origin().origin() =>
    {
      warn!("Refusing to forward {} {}", request.method, request.url);
      HttpResponse::Forbidden().body("forwarding to other hosts is disabled")
    }
    Ok(Routed::Passthrough) => match controller.forward(&request).await {
      Ok(response) => to_http_response(&response),
      Err(e) => {
        warn!("Upstream unreachable for {} {}: {}", request.method, request.url, e);
        HttpResponse::BadGateway().body("upstream unreachable")
      }
    },
    Err(OfflineError::NoOfflineContent { url }) => {
      warn!("No offline content for {}", url);
      HttpResponse::ServiceUnavailable().body("offline and no cached content available")
    }
    Err(e) => {
      error!("Failed to route {}: {}", request.url, e);
      HttpResponse::InternalServerError().finish()
    }
  }
}

/// Build the controller's view of an incoming request.
///
/// Origin-form targets (`/path?q`) are placed on the app origin;
/// absolute-form targets (forward-proxy style) keep their own origin.
fn intercepted_request(req: &HttpRequest, body: &[u8], origin: &Url) -> Result<InterceptedRequest> {
  let uri = req.uri();
  let url = if uri.scheme().is_some() && uri.authority().is_some() {
    Url::parse(&uri.to_string()).map_err(|e| eyre!("Invalid request URL: {}", e))?
  } else {
    let mut url = origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url
  };

  let method = Method::from_bytes(req.method().as_str().as_bytes())
    .map_err(|e| eyre!("Invalid method: {}", e))?;

  let request = req
    .headers()
    .iter()
    .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
    .fold(InterceptedRequest::get(url), |request, (name, value)| {
      request.with_header(name, value)
    })
    .with_method(method)
    .with_body(body.to_vec());

  let navigate = request
    .header("sec-fetch-mode")
    .is_some_and(|mode| mode.eq_ignore_ascii_case("navigate"));

  Ok(request.with_navigate(navigate))
}

fn to_http_response(response: &Response) -> HttpResponse {
  let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
  let mut builder = HttpResponse::build(status);
  for (name, value) in &response.headers {
    if !is_hop_by_hop(name) {
      builder.append_header((name.as_str(), value.as_str()));
    }
  }
  builder.body(response.body.clone())
}
