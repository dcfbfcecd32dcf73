//! 用户服务
//!
//! - `GetUser`：一元调用，用户 ID 为 `"error"` 时返回 `NotFound`
//! - `ListUsers`：服务端流，按页推送用户列表
//! - `UpdateUsers`：客户端流，统计收到的用户数
//! - `Chat`：双向流，逐条回显

use super::proto::{
    ChatRequest, ChatResponse, GetUserRequest, GetUserResponse, ListUsersRequest,
    ListUsersResponse, UpdateUsersRequest, UpdateUsersResponse, User,
};
use crate::client::Client;
use crate::context::CallContext;
use crate::error::{Result, RpcError};
use crate::interceptor::UnaryResponse;
use crate::message::downcast;
use crate::server::ServerBuilder;
use crate::spec::CallSpec;
use crate::stream::{
    StreamingHandlerConn, client_receive_as, client_send_message, receive_as, send_message,
};
use std::sync::Arc;
use tracing::{debug, info};

pub const SERVICE_NAME: &str = "flare.user.v1.UserService";
pub const GET_USER: &str = "flare.user.v1.UserService/GetUser";
pub const LIST_USERS: &str = "flare.user.v1.UserService/ListUsers";
pub const UPDATE_USERS: &str = "flare.user.v1.UserService/UpdateUsers";
pub const CHAT: &str = "flare.user.v1.UserService/Chat";

/// `ListUsers` 未指定页大小时的默认值
pub const DEFAULT_PAGE_SIZE: usize = 2;

const PAGE_TOKEN_PREFIX: &str = "page-";

/// 解析分页令牌，无法解析时从头开始
pub fn parse_page_token(token: &str) -> usize {
    token
        .strip_prefix(PAGE_TOKEN_PREFIX)
        .and_then(|index| index.parse().ok())
        .unwrap_or(0)
}

fn page_token(index: usize) -> String {
    format!("{}{}", PAGE_TOKEN_PREFIX, index)
}

/// 用户服务实现
#[derive(Debug, Clone)]
pub struct UserService {
    users: Arc<Vec<User>>,
}

impl Default for UserService {
    fn default() -> Self {
        Self::with_users(vec![
            User::new("user1", "Alice"),
            User::new("user2", "Bob"),
            User::new("user3", "Charlie"),
            User::new("user4", "Diana"),
            User::new("user5", "Eve"),
        ])
    }
}

impl UserService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: Arc::new(users),
        }
    }

    /// 把四个过程注册到服务器构建器
    pub fn register(&self, builder: ServerBuilder) -> ServerBuilder {
        let svc = self.clone();
        let builder = builder.unary(GET_USER, move |_ctx, req| {
            let svc = svc.clone();
            async move {
                let req = downcast::<GetUserRequest>(req.into_message())?;
                svc.get_user(req).map(UnaryResponse::new)
            }
        });

        let svc = self.clone();
        let builder = builder.streaming(CallSpec::server_stream(LIST_USERS), move |_ctx, conn| {
            let svc = svc.clone();
            async move { svc.list_users(conn.as_ref()).await }
        });

        let svc = self.clone();
        let builder =
            builder.streaming(CallSpec::client_stream(UPDATE_USERS), move |_ctx, conn| {
                let svc = svc.clone();
                async move { svc.update_users(conn.as_ref()).await }
            });

        let svc = self.clone();
        builder.streaming(CallSpec::bidi_stream(CHAT), move |_ctx, conn| {
            let svc = svc.clone();
            async move { svc.chat(conn.as_ref()).await }
        })
    }

    pub fn get_user(&self, req: GetUserRequest) -> Result<GetUserResponse> {
        info!(user_id = %req.user_id, "GetUser called");
        if req.user_id == "error" {
            return Err(RpcError::not_found("user not found"));
        }

        let user = self
            .users
            .iter()
            .find(|user| user.user_id == req.user_id)
            .cloned()
            .unwrap_or_else(|| User::new(req.user_id, "guest"));
        Ok(GetUserResponse { user: Some(user) })
    }

    /// 读取唯一的请求后按页推送
    pub async fn list_users(&self, conn: &dyn StreamingHandlerConn) -> Result<()> {
        let req = receive_as::<ListUsersRequest>(conn)
            .await?
            .ok_or_else(|| RpcError::invalid_argument("ListUsers expects a request message"))?;
        info!(page_size = req.page_size, page_token = %req.page_token, "ListUsers called");

        let page_size = usize::try_from(req.page_size)
            .ok()
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let total = self.users.len();
        let mut start = parse_page_token(&req.page_token);

        while start < total {
            let end = (start + page_size).min(total);
            debug!(start, end, "Sending page");

            let next_page_token = if end < total {
                page_token(end)
            } else {
                String::new()
            };
            send_message(
                conn,
                ListUsersResponse {
                    users: self.users[start..end].to_vec(),
                    next_page_token,
                },
            )
            .await?;
            start = end;
        }
        Ok(())
    }

    /// 收完全部批次后回复总数
    pub async fn update_users(&self, conn: &dyn StreamingHandlerConn) -> Result<()> {
        info!("UpdateUsers stream opened");
        let mut updated_count = 0usize;
        while let Some(batch) = receive_as::<UpdateUsersRequest>(conn).await? {
            debug!(count = batch.users.len(), "Received user batch");
            updated_count += batch.users.len();
        }

        let updated_count = i32::try_from(updated_count)
            .map_err(|_| RpcError::invalid_argument("too many users in one update"))?;
        send_message(conn, UpdateUsersResponse { updated_count }).await
    }

    /// 逐条回显，直到客户端结束发送
    pub async fn chat(&self, conn: &dyn StreamingHandlerConn) -> Result<()> {
        info!("Chat stream opened");
        while let Some(req) = receive_as::<ChatRequest>(conn).await? {
            debug!(text = %req.text, "Received chat message");
            send_message(
                conn,
                ChatResponse {
                    text: format!("Server echoes: {}", req.text),
                },
            )
            .await?;
        }
        info!("Chat stream closed by client");
        Ok(())
    }
}

/// 用户服务的类型化客户端
#[derive(Debug, Clone)]
pub struct UserClient {
    client: Client,
}

impl UserClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn get_user(
        &self,
        ctx: CallContext,
        user_id: impl Into<String>,
    ) -> Result<GetUserResponse> {
        let req = GetUserRequest {
            user_id: user_id.into(),
        };
        let resp = self.client.call_unary(ctx, GET_USER, req).await?;
        downcast::<GetUserResponse>(resp.into_message())
    }

    /// 拉取从第一页开始的全部页
    pub async fn list_users(
        &self,
        ctx: CallContext,
        page_size: i32,
    ) -> Result<Vec<ListUsersResponse>> {
        let conn = self.client.stream(ctx, CallSpec::server_stream(LIST_USERS));
        client_send_message(
            conn.as_ref(),
            ListUsersRequest {
                page_size,
                page_token: String::new(),
            },
        )
        .await?;
        conn.close_request().await?;

        let mut pages = Vec::new();
        while let Some(page) = client_receive_as::<ListUsersResponse>(conn.as_ref()).await? {
            pages.push(page);
        }
        conn.close_response().await?;
        Ok(pages)
    }

    /// 按批次发送用户，返回服务端统计的总数
    pub async fn update_users(
        &self,
        ctx: CallContext,
        batches: Vec<Vec<User>>,
    ) -> Result<UpdateUsersResponse> {
        let conn = self.client.stream(ctx, CallSpec::client_stream(UPDATE_USERS));
        for users in batches {
            client_send_message(conn.as_ref(), UpdateUsersRequest { users }).await?;
        }
        conn.close_request().await?;

        let resp = client_receive_as::<UpdateUsersResponse>(conn.as_ref())
            .await?
            .ok_or_else(|| RpcError::internal("UpdateUsers finished without a response"))?;
        conn.close_response().await?;
        Ok(resp)
    }

    /// 发送与接收在不同任务中并发进行
    pub async fn chat(&self, ctx: CallContext, texts: Vec<String>) -> Result<Vec<ChatResponse>> {
        let conn = self.client.stream(ctx, CallSpec::bidi_stream(CHAT));

        let sender = conn.clone();
        let sending = tokio::spawn(async move {
            for text in texts {
                client_send_message(sender.as_ref(), ChatRequest { text }).await?;
            }
            sender.close_request().await
        });

        let mut replies = Vec::new();
        while let Some(reply) = client_receive_as::<ChatResponse>(conn.as_ref()).await? {
            replies.push(reply);
        }
        sending
            .await
            .map_err(|err| RpcError::internal(format!("chat sender task failed: {}", err)))??;
        conn.close_response().await?;
        Ok(replies)
    }
}
