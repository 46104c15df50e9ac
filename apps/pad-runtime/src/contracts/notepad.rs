// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Confidential documents.
//!
//! Posts hold client-encrypted [`ContentEnvelope`]s. The contract enforces
//! who may change a post (root or its owner) and who may read it back
//! (root, owner, readers). Plaintext never reaches the runtime.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::{
    AccountId, ContractId, MessageOrigin, NativeContext, NativeContract, TransactionError,
    TransactionResult, NOTEPAD,
};
use crate::crypto::envelope::ContentEnvelope;

/// Default maximum encoded size of a post's content.
pub const DEFAULT_MAX_POST_BYTES: usize = 256 * 1024;
pub const MAX_POST_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Post {
    pub id: String,
    pub content: ContentEnvelope,
    #[schema(value_type = String)]
    pub owner: AccountId,
    #[schema(value_type = Vec<String>)]
    pub readable_by: Vec<AccountId>,
    /// Seconds since the Unix epoch, from the block timestamp.
    pub created_on: u64,
    pub updated_on: u64,
}

impl Post {
    fn can_read(&self, account: &AccountId) -> bool {
        self.owner == *account || self.readable_by.contains(account)
    }
}

/// Metadata returned by [`Request::ListPosts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PostSummary {
    pub id: String,
    #[schema(value_type = String)]
    pub owner: AccountId,
    pub readers: usize,
    pub created_on: u64,
    pub updated_on: u64,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            owner: post.owner,
            readers: post.readable_by.len(),
            created_on: post.created_on,
            updated_on: post.updated_on,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    CreatePost {
        id: String,
        owner: AccountId,
        #[serde(default)]
        readable_by: Vec<AccountId>,
        content: ContentEnvelope,
    },
    UpdatePost {
        id: String,
        content: ContentEnvelope,
    },
    ShareWith {
        id: String,
        reader: AccountId,
    },
    RevokeReader {
        id: String,
        reader: AccountId,
    },
    DeletePost {
        id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    QueryPost { id: String },
    ListPosts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Post(Box<Post>),
    Posts(Vec<PostSummary>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    #[error("query origin unavailable")]
    OriginUnavailable,
    #[error("not authorized")]
    NotAuthorized,
    #[error("post not found")]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notepad {
    root: AccountId,
    max_post_bytes: usize,
    posts: BTreeMap<String, Post>,
}

impl Notepad {
    pub fn new(root: AccountId, max_post_bytes: usize) -> Self {
        Self {
            root,
            max_post_bytes,
            posts: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    fn sender(origin: &MessageOrigin) -> Result<AccountId, TransactionError> {
        origin.account().copied().ok_or(TransactionError::BadOrigin)
    }

    fn check_content(&self, content: &ContentEnvelope) -> TransactionResult {
        content
            .validate()
            .map_err(|e| TransactionError::BadInput(e.to_string()))?;
        let size = content.encoded_len();
        if size > self.max_post_bytes {
            return Err(TransactionError::PayloadTooLarge {
                size,
                limit: self.max_post_bytes,
            });
        }
        Ok(())
    }

    /// Look up a post the sender is allowed to modify.
    fn post_mut(&mut self, sender: &AccountId, id: &str) -> Result<&mut Post, TransactionError> {
        let root = self.root;
        let post = self
            .posts
            .get_mut(id)
            .ok_or_else(|| TransactionError::NotFound(format!("post {id}")))?;
        if *sender != root && *sender != post.owner {
            return Err(TransactionError::BadOrigin);
        }
        Ok(post)
    }
}

impl NativeContract for Notepad {
    type Cmd = Command;
    type QReq = Request;
    type QResp = Result<Response, Error>;

    fn id(&self) -> ContractId {
        NOTEPAD
    }

    fn name(&self) -> &'static str {
        "notepad"
    }

    fn handle_command(
        &mut self,
        context: &mut NativeContext<'_>,
        origin: MessageOrigin,
        cmd: Command,
    ) -> TransactionResult {
        let sender = Self::sender(&origin)?;
        let now = context.block.now_secs();

        match cmd {
            Command::CreatePost {
                id,
                owner,
                readable_by,
                content,
            } => {
                if sender != self.root && sender != owner {
                    return Err(TransactionError::BadOrigin);
                }
                if id.is_empty() || id.chars().count() > MAX_POST_ID_LEN {
                    return Err(TransactionError::BadInput(format!(
                        "post id must be 1..={MAX_POST_ID_LEN} characters"
                    )));
                }
                if self.posts.contains_key(&id) {
                    return Err(TransactionError::AlreadyExists(format!("post {id}")));
                }
                self.check_content(&content)?;

                let mut readers: Vec<AccountId> = Vec::with_capacity(readable_by.len());
                for reader in readable_by {
                    if !readers.contains(&reader) {
                        readers.push(reader);
                    }
                }

                info!(post_id = %id, owner = %owner, readers = readers.len(), "Post created");
                self.posts.insert(
                    id.clone(),
                    Post {
                        id,
                        content,
                        owner,
                        readable_by: readers,
                        created_on: now,
                        updated_on: now,
                    },
                );
            }
            Command::UpdatePost { id, content } => {
                self.check_content(&content)?;
                let post = self.post_mut(&sender, &id)?;
                post.content = content;
                post.updated_on = now;
                debug!(post_id = %id, "Post updated");
            }
            Command::ShareWith { id, reader } => {
                let post = self.post_mut(&sender, &id)?;
                if !post.readable_by.contains(&reader) {
                    post.readable_by.push(reader);
                    post.updated_on = now;
                }
                debug!(post_id = %id, reader = %reader, "Post shared");
            }
            Command::RevokeReader { id, reader } => {
                let post = self.post_mut(&sender, &id)?;
                let before = post.readable_by.len();
                post.readable_by.retain(|r| *r != reader);
                if post.readable_by.len() == before {
                    return Err(TransactionError::NotFound(format!(
                        "{reader} is not a reader of post {id}"
                    )));
                }
                post.updated_on = now;
                debug!(post_id = %id, reader = %reader, "Reader revoked");
            }
            Command::DeletePost { id } => {
                self.post_mut(&sender, &id)?;
                self.posts.remove(&id);
                info!(post_id = %id, "Post deleted");
            }
        }
        Ok(())
    }

    fn handle_query(&self, origin: Option<&AccountId>, req: Request) -> Result<Response, Error> {
        let sender = origin.ok_or(Error::OriginUnavailable)?;
        let is_root = *sender == self.root;

        match req {
            Request::QueryPost { id } => {
                // Only root learns whether an id exists.
                match self.posts.get(&id) {
                    Some(post) if is_root || post.can_read(sender) => {
                        Ok(Response::Post(Box::new(post.clone())))
                    }
                    None if is_root => Err(Error::NotFound),
                    _ => Err(Error::NotAuthorized),
                }
            }
            Request::ListPosts => Ok(Response::Posts(
                self.posts
                    .values()
                    .filter(|post| is_root || post.can_read(sender))
                    .map(PostSummary::from)
                    .collect(),
            )),
        }
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(&self.posts).unwrap_or(Value::Null)
    }

    /// Only posts are sealed; root and size limit come from configuration.
    fn restore(&mut self, state: Value) -> Result<(), serde_json::Error> {
        self.posts = serde_json::from_value(state)?;
        Ok(())
    }
}
