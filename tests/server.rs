//! Real socket round-trips through the hyper transport.

use std::net::SocketAddr;
use std::time::Duration;

use ferrule::{Error, Pipeline, Request, RequestHead, Response, Router, RunningServer, Server, ServerConfig, Status};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

mod common;

use common::exception_funnel;

async fn start(pipeline: impl Into<Pipeline>) -> RunningServer {
    let config = ServerConfig::new("127.0.0.1", 0).with_shutdown_timeout(Duration::from_secs(2));
    Server::new(config).bind(pipeline).await.unwrap()
}

/// Sends one HTTP/1.1 request and reads until the server closes.
async fn roundtrip(addr: SocketAddr, method: &str, target: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    String::from_utf8(raw).unwrap()
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or_default()
}

fn body_of(response: &str) -> &str {
    response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}

#[tokio::test]
async fn serves_routes_with_path_variables() {
    let app = Router::new().nest(
        "/examples",
        Router::new()
            .get("/", |_req: Request| async { "Hello world, from /examples" })
            .get("/{id}", |req: Request| async move {
                let id = req.param("id").unwrap_or_default();
                Response::text(format!("Hello world, from /examples/{{id}}, with id={id}"))
            }),
    );
    let server = start(app).await;

    let response = roundtrip(server.local_addr(), "GET", "/examples/42", "").await;
    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert!(response.to_ascii_lowercase().contains("content-type: text/plain; charset=utf-8"));
    assert_eq!(body_of(&response), "Hello world, from /examples/{id}, with id=42");

    let response = roundtrip(server.local_addr(), "GET", "/examples/", "").await;
    assert_eq!(body_of(&response), "Hello world, from /examples");

    server.close().await;
}

#[tokio::test]
async fn reads_request_bodies_and_queries() {
    let app = Router::new().post("/echo", |mut req: Request| async move {
        let greeting = req.query("greeting").unwrap_or("hi").to_owned();
        let body = req.take_body().collect().await?;
        let body = String::from_utf8_lossy(&body).into_owned();
        Ok::<_, Error>(Response::text(format!("{greeting}, {body}")))
    });
    let server = start(app).await;

    let response = roundtrip(server.local_addr(), "POST", "/echo?greeting=hello", "world").await;
    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert_eq!(body_of(&response), "hello, world");

    server.close().await;
}

#[tokio::test]
async fn unmatched_routes_are_404_without_a_funnel() {
    let server = start(Router::new().get("/", |_req: Request| async { "root" })).await;

    let response = roundtrip(server.local_addr(), "GET", "/missing", "").await;
    assert_eq!(status_line(&response), "HTTP/1.1 404 Not Found");

    server.close().await;
}

#[tokio::test]
async fn unsupported_methods_are_405() {
    let server = start(Router::new().any("/", |_req: Request| async { "anything" })).await;

    let response = roundtrip(server.local_addr(), "PURGE", "/", "").await;
    assert_eq!(status_line(&response), "HTTP/1.1 405 Method Not Allowed");

    server.close().await;
}

#[tokio::test]
async fn funnel_response_goes_over_the_wire() {
    async fn fails(_req: Request) -> Result<Response, Error> {
        tokio::task::yield_now().await;
        Err(Error::handler("Asynchronous exception"))
    }

    let pipeline = Pipeline::builder(fails).funnel(exception_funnel).build();
    let server = start(pipeline).await;

    let response = roundtrip(server.local_addr(), "GET", "/", "").await;
    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");
    assert!(response.to_ascii_lowercase().contains("my-header: my-value"));
    assert_eq!(body_of(&response), "An exception occurred: Asynchronous exception");

    server.close().await;
}

#[tokio::test]
async fn streamed_bodies_arrive_in_order() {
    let app = Router::new().get("/stream", |_req: Request| async {
        let mut res = Response::status(Status::OK);
        res.set_header("content-type", "text/plain")?;
        let mut writer = res.start_body();
        tokio::spawn(async move {
            for chunk in ["one ", "two ", "three"] {
                if writer.send(chunk).await.is_err() {
                    break;
                }
            }
        });
        Ok::<_, Error>(res)
    });
    let server = start(app).await;

    let response = roundtrip(server.local_addr(), "GET", "/stream", "").await;
    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    // Chunked framing surrounds the payload; the pieces appear in order.
    let body = body_of(&response);
    let one = body.find("one").unwrap();
    let two = body.find("two").unwrap();
    let three = body.find("three").unwrap();
    assert!(one < two && two < three);

    server.close().await;
}

#[tokio::test]
async fn close_releases_the_socket() {
    let pipeline = Pipeline::builder(|_req: Request| async { "ok" })
        .funnel(|_head: RequestHead, err: Error| async move { Response::status(err.status()) })
        .build();
    let server = start(pipeline).await;
    let addr = server.local_addr();
    assert_ne!(addr.port(), 0);

    server.close().await;

    // Rebinding the exact address only succeeds once the listener is gone.
    let rebound = TcpListener::bind(addr).await;
    assert!(rebound.is_ok(), "port {} still in use", addr.port());
}

#[tokio::test]
async fn binding_a_taken_port_fails() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let result = Server::new(ServerConfig::new("127.0.0.1", port))
        .bind(Router::new())
        .await;
    assert!(matches!(result, Err(Error::Io(_))));
}
