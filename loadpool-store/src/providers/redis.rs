use crate::{
    errors::Result,
    resp::{parse_frame, unexpected, Frame},
    store::SharedStore,
    StoreError,
};

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Where and how to reach the Redis server.
#[derive(Debug, Clone)]
pub struct RedisOptions {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub database: Option<u32>,
}

impl Default for RedisOptions {
    fn default() -> Self {
        RedisOptions {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            database: None,
        }
    }
}

struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    /// Set while a request is in flight. Stays set when the caller drops the
    /// future before the reply was read, leaving the stream out of sync.
    poisoned: bool,
}

impl Connection {
    async fn open(options: &RedisOptions) -> Result<Self> {
        let stream = TcpStream::connect((options.host.as_str(), options.port)).await?;
        let mut conn = Connection {
            stream,
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
            poisoned: false,
        };

        if let Some(password) = &options.password {
            expect_ok(conn.send(&["AUTH", password.as_str()]).await?)?;
        }
        if let Some(db) = options.database {
            let db = db.to_string();
            expect_ok(conn.send(&["SELECT", db.as_str()]).await?)?;
        }
        Ok(conn)
    }

    async fn send(&mut self, tokens: &[&str]) -> Result<Frame> {
        self.round_trip(tokens).await?.into_result()
    }

    /// Writes one command and reads its reply without interpreting error frames.
    async fn round_trip(&mut self, tokens: &[&str]) -> Result<Frame> {
        self.poisoned = true;
        self.write_buf.clear();
        Frame::command(tokens.iter().copied()).serialize(&mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        let reply = self.read_reply().await?;
        self.poisoned = false;
        Ok(reply)
    }

    async fn read_reply(&mut self) -> Result<Frame> {
        loop {
            if let Some((frame, consumed)) = parse_frame(&self.read_buf)? {
                self.read_buf.advance(consumed);
                return Ok(frame);
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(StoreError::Disconnected);
            }
        }
    }
}

enum Link {
    Open(Connection),
    /// Dropped after a failure; the next command dials again.
    Broken,
    Ended,
}

/// RedisStore keeps one connection to a Redis server and issues commands
/// over it one at a time.
///
/// A connection whose request/reply pairing can no longer be trusted (an
/// abandoned request, an I/O or protocol failure) is dropped. The command
/// that finds it that way fails with `StoreError::Disconnected` and the
/// following one reconnects.
#[derive(Clone)]
pub struct RedisStore {
    addr: String,
    options: RedisOptions,
    link: Arc<Mutex<Link>>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("addr", &self.addr).finish()
    }
}

impl RedisStore {
    pub async fn connect(options: RedisOptions) -> Result<Self> {
        let addr = format!("{}:{}", options.host, options.port);
        let conn = Connection::open(&options).await?;

        info!(addr = %addr, "connected to redis store");

        Ok(RedisStore {
            addr,
            options,
            link: Arc::new(Mutex::new(Link::Open(conn))),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn command(&self, tokens: &[&str]) -> Result<Frame> {
        let mut guard = self.link.lock().await;

        if matches!(&*guard, Link::Open(conn) if conn.poisoned) {
            warn!(addr = %self.addr, "redis connection left mid-request, dropping it");
            *guard = Link::Broken;
            return Err(StoreError::Disconnected);
        }
        if matches!(&*guard, Link::Broken) {
            let conn = Connection::open(&self.options).await?;
            info!(addr = %self.addr, "reconnected to redis store");
            *guard = Link::Open(conn);
        }
        let conn = match &mut *guard {
            Link::Open(conn) => conn,
            Link::Broken | Link::Ended => return Err(StoreError::Closed),
        };

        debug!(command = tokens[0], "redis command");
        let reply = conn.round_trip(tokens).await;
        if matches!(
            reply,
            Err(StoreError::Io(_) | StoreError::Protocol(_) | StoreError::Disconnected)
        ) {
            *guard = Link::Broken;
        }
        reply?.into_result()
    }

    async fn integer(&self, tokens: &[&str]) -> Result<i64> {
        self.command(tokens).await?.into_integer()
    }
}

fn expect_ok(frame: Frame) -> Result<()> {
    match frame {
        Frame::Simple(s) if s == "OK" => Ok(()),
        other => Err(unexpected(&other)),
    }
}

fn string_list(frame: Frame) -> Result<Vec<String>> {
    match frame {
        Frame::Array(items) => items.into_iter().map(Frame::into_string).collect(),
        Frame::Null => Ok(Vec::new()),
        other => Err(unexpected(&other)),
    }
}

fn optional_string(frame: Frame) -> Result<Option<String>> {
    match frame {
        Frame::Null => Ok(None),
        other => other.into_string().map(Some),
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn add_member(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.integer(&["SADD", key, member]).await? == 1)
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut tokens = Vec::with_capacity(members.len() + 2);
        tokens.push("SADD");
        tokens.push(key);
        tokens.extend(members.iter().map(String::as_str));

        Ok(self.integer(&tokens).await? as usize)
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.integer(&["SREM", key, member]).await? == 1)
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        string_list(self.command(&["SMEMBERS", key]).await?)
    }

    async fn pop_member(&self, key: &str) -> Result<Option<String>> {
        optional_string(self.command(&["SPOP", key]).await?)
    }

    async fn member_count(&self, key: &str) -> Result<usize> {
        Ok(self.integer(&["SCARD", key]).await? as usize)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        optional_string(self.command(&["GET", key]).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        expect_ok(self.command(&["SET", key, value]).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.integer(&["DEL", key]).await?;
        Ok(())
    }

    async fn end(&self, flush: bool) -> Result<()> {
        let mut guard = self.link.lock().await;
        let conn = match std::mem::replace(&mut *guard, Link::Ended) {
            Link::Ended => return Err(StoreError::Closed),
            Link::Open(conn) if !conn.poisoned => Some(conn),
            Link::Open(_) | Link::Broken => None,
        };
        let mut conn = match conn {
            Some(conn) => conn,
            None if flush => Connection::open(&self.options).await?,
            None => {
                info!(addr = %self.addr, flush, "redis store connection ended");
                return Ok(());
            }
        };

        if flush {
            expect_ok(conn.send(&["FLUSHALL"]).await?)?;
        }
        // QUIT is best effort, the socket is dropped either way
        let _ = conn.send(&["QUIT"]).await;

        info!(addr = %self.addr, flush, "redis store connection ended");
        Ok(())
    }
}
