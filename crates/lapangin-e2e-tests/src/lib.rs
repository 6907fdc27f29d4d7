use std::{path::Path, time::Duration};

use anyhow::{Result, anyhow};
use lapangin_dal::user::{CreateUser, User, UserRepository};
use lapangin_server::config::{Parser, ServerConfig};
use lapangin_types::claim::Role;
use rand::Rng as _;
use reqwest::{
    Url,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde_json::json;
use tempfile::TempDir;
use tracing::{debug, error};

pub mod rest;

pub const TEST_PASSWORD: &str = "password123";

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub fn test_config(test_name: &str, base_dir: &Path) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix_in(format!("{}_", test_name), base_dir)?;
    let data_dir = tmp_data_dir.path().to_string_lossy().to_string();
    let port = random_port()?;
    let port = port.to_string();
    let args = &[
        "lapangin-e2e-tests",
        "--data-dir",
        &data_dir,
        "--port",
        &port,
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

/// Fresh data directory with migrated database, server is not started yet
pub async fn prepare_env(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let (config, guard) = test_config(test_name, &std::env::temp_dir())?;
    let pool = lapangin_dal::new_pool(&config.database_url()).await?;
    lapangin_dal::migrate(&pool).await?;
    pool.close().await;
    Ok((config, guard))
}

pub fn base_url(config: &ServerConfig) -> Url {
    // port is u16, so this is always a valid URL
    Url::parse(&format!("http://127.0.0.1:{}/", config.port)).unwrap()
}

pub fn extend_url(base_url: &Url, path: impl AsRef<str>) -> Url {
    base_url.join(path.as_ref()).unwrap()
}

/// Starts server in background task and waits until it accepts connections
pub async fn spawn_server(config: ServerConfig) -> Result<()> {
    let state = lapangin_server::build_state(&config).await?;
    let addr: std::net::SocketAddr = format!("127.0.0.1:{}", config.port).parse()?;
    tokio::spawn(async move {
        let shutdown = futures::future::pending::<()>();
        if let Err(e) = lapangin_server::run_graceful_with_state(config, state, shutdown).await {
            error!("Server failed: {e}");
        }
    });

    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Err(anyhow!("Server did not start on {addr}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestUser {
    Admin,
    Provider,
    User,
    OtherUser,
    None,
}

impl TestUser {
    pub fn name(&self) -> &'static str {
        match self {
            TestUser::Admin => "admin",
            TestUser::Provider => "provider",
            TestUser::User => "user",
            TestUser::OtherUser => "other",
            TestUser::None => "",
        }
    }

    pub fn email(&self) -> String {
        format!("{}@example.com", self.name())
    }

    fn roles(&self) -> Vec<Role> {
        match self {
            TestUser::Admin => vec![Role::Admin],
            TestUser::Provider => vec![Role::VenueProvider],
            TestUser::User | TestUser::OtherUser | TestUser::None => vec![Role::User],
        }
    }
}

/// Creates user directly in database
pub async fn create_user(config: &ServerConfig, user: TestUser) -> Result<User> {
    let pool = lapangin_dal::new_pool(&config.database_url()).await?;
    let repository = UserRepository::new(pool.clone());
    let new_user = CreateUser {
        email: user.email().parse()?,
        name: user.name().to_string(),
        password: Some(TEST_PASSWORD.to_string()),
        roles: Some(user.roles()),
        active: Some(true),
    };
    let created = repository.create(new_user).await?;
    pool.close().await;
    Ok(created)
}

pub async fn login(base_url: &Url, email: &str, password: &str) -> Result<String> {
    let response = reqwest::Client::new()
        .post(extend_url(base_url, "auth/login"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(anyhow!("Login failed with status {}", response.status()));
    }
    let body: serde_json::Value = response.json().await?;
    body["token"]
        .as_str()
        .map(|t| t.to_string())
        .ok_or_else(|| anyhow!("No token in login response"))
}

/// Client which sends bearer token with every request
pub fn client_with_token(token: &str) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Creates the test user and returns client logged in as this user
pub async fn user_client(
    config: &ServerConfig,
    user: TestUser,
) -> Result<(reqwest::Client, Option<User>)> {
    if user == TestUser::None {
        return Ok((reqwest::Client::new(), None));
    }
    let created = create_user(config, user).await?;
    let token = login(&base_url(config), &user.email(), TEST_PASSWORD).await?;
    debug!("Logged in as {}", created.email);
    Ok((client_with_token(&token)?, Some(created)))
}

/// Starts server and returns client for given test user plus server base URL
pub async fn launch_env(config: ServerConfig, user: TestUser) -> Result<(reqwest::Client, Url)> {
    let url = base_url(&config);
    let config_copy = config.clone();
    spawn_server(config).await?;
    let (client, _) = user_client(&config_copy, user).await?;
    Ok((client, url))
}
