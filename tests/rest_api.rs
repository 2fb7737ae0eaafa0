use cura_backend::api;
use cura_backend::config::CuraConfig;
use cura_backend::database::Database;
use serde_json::json;
use tempfile::{tempdir, TempDir};
use tokio::time::{sleep, Duration};

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

struct TestServer {
    _dir: TempDir,
    server: tokio::task::JoinHandle<()>,
    base_url: String,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempdir().expect("tempdir");
        let config = CuraConfig::from_base_dir(dir.path()).expect("config");
        let database = Database::connect(&config.paths).expect("database");
        database.ensure_migrations().expect("migrations");

        let state = api::build_state(config, database);
        let app = api::router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });

        let base_url = format!("http://{addr}");
        wait_for_health(&base_url).await;
        Self {
            _dir: dir,
            server,
            base_url,
        }
    }

    async fn shutdown(self) {
        self.server.abort();
        let _ = self.server.await;
    }
}

async fn wait_for_health(base_url: &str) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("server did not become healthy in time");
}

async fn put_profile(client: &reqwest::Client, base_url: &str, user_id: &str, name: &str) {
    let resp = client
        .put(format!("{base_url}/profiles/{user_id}"))
        .json(&json!({ "display_name": name }))
        .send()
        .await
        .expect("upsert profile");
    assert!(resp.status().is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn feed_roundtrip_with_likes_and_comments() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    put_profile(&client, base, "alice", "Alice").await;
    put_profile(&client, base, "bob", "Bob").await;

    let post: serde_json::Value = client
        .post(format!("{base}/posts"))
        .json(&json!({ "user_id": "alice", "content": "first post" }))
        .send()
        .await
        .expect("create post")
        .json()
        .await
        .expect("post json");
    let post_id = post.get("id").and_then(|id| id.as_str()).expect("post id");

    let empty = client
        .post(format!("{base}/posts"))
        .json(&json!({ "user_id": "alice" }))
        .send()
        .await
        .expect("empty post response");
    assert_eq!(empty.status(), 400);

    let first_like: serde_json::Value = client
        .post(format!("{base}/posts/{post_id}/like"))
        .json(&json!({ "user_id": "bob" }))
        .send()
        .await
        .expect("like")
        .json()
        .await
        .expect("like json");
    assert_eq!(first_like["liked"], json!(true));

    let second_like: serde_json::Value = client
        .post(format!("{base}/posts/{post_id}/like"))
        .json(&json!({ "user_id": "bob" }))
        .send()
        .await
        .expect("like again")
        .json()
        .await
        .expect("like json");
    assert_eq!(second_like["liked"], json!(false));

    let comment: serde_json::Value = client
        .post(format!("{base}/posts/{post_id}/comments"))
        .json(&json!({ "user_id": "bob", "content": "nice" }))
        .send()
        .await
        .expect("comment")
        .json()
        .await
        .expect("comment json");
    let comment_id = comment.get("id").and_then(|id| id.as_str()).expect("comment id");

    let reply = client
        .post(format!("{base}/posts/{post_id}/comments"))
        .json(&json!({
            "user_id": "alice",
            "content": "thanks",
            "parent_comment_id": comment_id,
        }))
        .send()
        .await
        .expect("reply");
    assert!(reply.status().is_success());

    let fetched: serde_json::Value = client
        .get(format!("{base}/posts/{post_id}"))
        .send()
        .await
        .expect("get post")
        .json()
        .await
        .expect("post json");
    assert_eq!(fetched["like_count"], json!(1));
    assert_eq!(fetched["author"]["display_name"], json!("Alice"));
    let comments = fetched["comments"].as_array().expect("comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["replies"].as_array().expect("replies").len(), 1);

    let feed: serde_json::Value = client
        .get(format!("{base}/posts"))
        .send()
        .await
        .expect("feed")
        .json()
        .await
        .expect("feed json");
    assert_eq!(feed.as_array().expect("feed array").len(), 1);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn friendship_flow_and_notifications() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    put_profile(&client, base, "alice", "Alice").await;
    put_profile(&client, base, "bob", "Bob").await;

    let request: serde_json::Value = client
        .post(format!("{base}/friendships"))
        .json(&json!({ "user_id": "alice", "friend_id": "bob" }))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("request json");
    let friendship_id = request.get("id").and_then(|id| id.as_str()).expect("id");

    let duplicate = client
        .post(format!("{base}/friendships"))
        .json(&json!({ "user_id": "bob", "friend_id": "alice" }))
        .send()
        .await
        .expect("duplicate response");
    assert_eq!(duplicate.status(), 409);

    let pending: serde_json::Value = client
        .get(format!("{base}/users/bob/friend-requests"))
        .send()
        .await
        .expect("pending")
        .json()
        .await
        .expect("pending json");
    assert_eq!(pending.as_array().expect("pending array").len(), 1);

    let wrong_acceptor = client
        .post(format!("{base}/friendships/{friendship_id}/accept"))
        .json(&json!({ "user_id": "alice" }))
        .send()
        .await
        .expect("wrong acceptor response");
    assert_eq!(wrong_acceptor.status(), 400);

    let accepted = client
        .post(format!("{base}/friendships/{friendship_id}/accept"))
        .json(&json!({ "user_id": "bob" }))
        .send()
        .await
        .expect("accept response");
    assert!(accepted.status().is_success());

    let friends: serde_json::Value = client
        .get(format!("{base}/users/alice/friends"))
        .send()
        .await
        .expect("friends")
        .json()
        .await
        .expect("friends json");
    let friends = friends.as_array().expect("friends array");
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0]["friend"]["user_id"], json!("bob"));

    let inbox: serde_json::Value = client
        .get(format!("{base}/users/bob/notifications"))
        .send()
        .await
        .expect("notifications")
        .json()
        .await
        .expect("notifications json");
    let inbox = inbox.as_array().expect("inbox array");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["kind"], json!("friend_request"));
    let notification_id = inbox[0]["id"].as_str().expect("notification id");

    let read: serde_json::Value = client
        .post(format!("{base}/notifications/{notification_id}/read"))
        .json(&json!({ "user_id": "bob" }))
        .send()
        .await
        .expect("mark read")
        .json()
        .await
        .expect("read json");
    assert_eq!(read["read"], json!(true));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn messaging_roundtrip() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    put_profile(&client, base, "alice", "Alice").await;
    put_profile(&client, base, "bob", "Bob").await;

    let forward: serde_json::Value = client
        .post(format!("{base}/conversations"))
        .json(&json!({ "user_id": "alice", "other_user_id": "bob" }))
        .send()
        .await
        .expect("resolve")
        .json()
        .await
        .expect("resolve json");
    let reverse: serde_json::Value = client
        .post(format!("{base}/conversations"))
        .json(&json!({ "user_id": "bob", "other_user_id": "alice" }))
        .send()
        .await
        .expect("resolve reversed")
        .json()
        .await
        .expect("resolve json");
    assert_eq!(forward["id"], reverse["id"]);
    let conversation_id = forward["id"].as_str().expect("conversation id");

    let sent = client
        .post(format!("{base}/conversations/{conversation_id}/messages"))
        .json(&json!({ "user_id": "alice", "content": "hello bob" }))
        .send()
        .await
        .expect("send response");
    assert!(sent.status().is_success());

    let outsider = client
        .post(format!("{base}/conversations/{conversation_id}/messages"))
        .json(&json!({ "user_id": "mallory", "content": "let me in" }))
        .send()
        .await
        .expect("outsider response");
    assert_eq!(outsider.status(), 400);

    let history: serde_json::Value = client
        .get(format!("{base}/conversations/{conversation_id}/messages"))
        .send()
        .await
        .expect("history")
        .json()
        .await
        .expect("history json");
    let history = history.as_array().expect("history array");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["content"], json!("hello bob"));

    let listed: serde_json::Value = client
        .get(format!("{base}/users/bob/conversations"))
        .send()
        .await
        .expect("conversations")
        .json()
        .await
        .expect("conversations json");
    let listed = listed.as_array().expect("conversations array");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["counterpart"]["user_id"], json!("alice"));
    assert_eq!(listed[0]["last_message"]["content"], json!("hello bob"));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn story_upload_and_listing() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    put_profile(&client, base, "alice", "Alice").await;

    let form = reqwest::multipart::Form::new()
        .text("user_id", "alice")
        .part(
            "file",
            reqwest::multipart::Part::bytes(PNG_MAGIC.to_vec())
                .file_name("story.png")
                .mime_str("image/png")
                .expect("mime"),
        );
    let story: serde_json::Value = client
        .post(format!("{base}/stories"))
        .multipart(form)
        .send()
        .await
        .expect("create story")
        .json()
        .await
        .expect("story json");
    let media_url = story["media_url"].as_str().expect("media url");
    assert!(media_url.starts_with("/media/story-media/"));

    let listed: serde_json::Value = client
        .get(format!("{base}/stories"))
        .send()
        .await
        .expect("stories")
        .json()
        .await
        .expect("stories json");
    let listed = listed.as_array().expect("stories array");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["author"]["display_name"], json!("Alice"));

    let served = client
        .get(format!("{base}{media_url}"))
        .send()
        .await
        .expect("serve media");
    assert!(served.status().is_success());
    assert_eq!(
        served.headers()["content-type"].to_str().expect("header"),
        "image/png"
    );
    let body = served.bytes().await.expect("media bytes");
    assert_eq!(&body[..], PNG_MAGIC);

    server.shutdown().await;
}
