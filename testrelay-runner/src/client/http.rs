// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{CallHandle, Completion, ReportingClient};
use crate::errors::ClientError;
use debug_ignore::DebugIgnore;
use futures::{
    FutureExt,
    future::{BoxFuture, Shared, join_all},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use testrelay_model::{
    FinishItem, FinishLaunch, ItemUuid, LaunchUuid, LogEntry, LogLevel, StartItem, StartLaunch,
};
use tokio::runtime::Handle;
use tracing::debug;

/// Resolves to the id the backend assigned to an entity.
type RemoteId = Shared<BoxFuture<'static, Result<String, ClientError>>>;

type SharedCompletion = Shared<Completion>;

/// A [`ReportingClient`] that talks to the backend over HTTP.
///
/// Each call is spawned onto a tokio runtime as soon as it is issued. Calls
/// that refer to another entity first wait for that entity to be created, and
/// are skipped with [`ClientError::DependencyFailed`] if its creation failed.
/// Finishing an item waits for everything created under it to settle.
#[derive(Debug)]
pub struct HttpReportingClient {
    inner: Arc<Inner>,
    runtime: Handle,
    launches: DebugIgnore<HashMap<LaunchUuid, RemoteId>>,
    items: DebugIgnore<HashMap<ItemUuid, ItemState>>,
}

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

struct ItemState {
    parent: Option<ItemUuid>,
    remote: RemoteId,
    // Finishes and logs of children, awaited before this item is finished.
    children: Vec<SharedCompletion>,
}

impl HttpReportingClient {
    /// Creates a new client for `project` on the backend at `endpoint`.
    ///
    /// Requests are spawned onto `runtime`.
    pub fn new(
        endpoint: &str,
        project: &str,
        access_token: impl Into<String>,
        runtime: Handle,
    ) -> Result<Self, ClientError> {
        let base_url = format!("{}/api/v1/{project}", endpoint.trim_end_matches('/'));
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| ClientError::Request {
                url: base_url.clone(),
                error: Arc::new(error),
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                access_token: access_token.into(),
            }),
            runtime,
            launches: DebugIgnore(HashMap::new()),
            items: DebugIgnore(HashMap::new()),
        })
    }

    /// Returns the base URL that requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    fn spawn<T, F>(&self, entity: String, fut: F) -> BoxFuture<'static, Result<T, ClientError>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        self.runtime
            .spawn(fut)
            .map(move |joined| joined.unwrap_or_else(|_| Err(ClientError::TaskCancelled { entity })))
            .boxed()
    }

    fn launch_remote(&self, launch: LaunchUuid) -> Result<RemoteId, ClientError> {
        self.launches
            .get(&launch)
            .cloned()
            .ok_or_else(|| ClientError::UnknownEntity {
                kind: "launch",
                id: launch.to_string(),
            })
    }

    fn item_remote(&self, item: ItemUuid) -> Result<RemoteId, ClientError> {
        self.items
            .get(&item)
            .map(|state| state.remote.clone())
            .ok_or_else(|| ClientError::UnknownEntity {
                kind: "item",
                id: item.to_string(),
            })
    }

    fn register_item(&mut self, id: ItemUuid, parent: Option<ItemUuid>, remote: RemoteId) {
        self.items.insert(
            id,
            ItemState {
                parent,
                remote,
                children: Vec::new(),
            },
        );
    }

    /// Records `completion` as something `item`'s finish must wait for.
    fn add_child_completion(&mut self, item: Option<ItemUuid>, completion: Completion) -> Completion {
        let shared = completion.shared();
        if let Some(state) = item.and_then(|item| self.items.get_mut(&item)) {
            state.children.push(shared.clone());
        }
        shared.boxed()
    }

    fn create_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        item: StartItem,
    ) -> (ItemUuid, RemoteId) {
        let id = ItemUuid::new_v4();
        let entity = format!("{} `{}`", item.item_type, item.name);
        let dependencies = self
            .launch_remote(launch)
            .and_then(|launch| Ok((launch, parent.map(|p| self.item_remote(p)).transpose()?)));
        let inner = self.inner.clone();

        let fut = {
            let entity = entity.clone();
            async move {
                let (launch, parent) = dependencies?;
                let launch_uuid = await_dependency(launch, &entity, "its launch").await?;
                let url = match parent {
                    Some(parent) => {
                        let parent = await_dependency(parent, &entity, "its parent").await?;
                        format!("{}/item/{parent}", inner.base_url)
                    }
                    None => format!("{}/item", inner.base_url),
                };
                let body = WithLaunch {
                    launch_uuid: &launch_uuid,
                    request: &item,
                };
                inner.create(inner.http.post(&url).json(&body), url).await
            }
        };
        let remote = self.spawn(entity, fut).shared();
        self.register_item(id, parent, remote.clone());
        debug!("issued create for item {id}");
        (id, remote)
    }

    fn finish_item_inner(
        &mut self,
        launch: LaunchUuid,
        item: ItemUuid,
        finish: FinishItem,
    ) -> Completion {
        // Nothing refers to an item once its finish is issued.
        let Some(ItemState {
            parent,
            remote,
            children,
        }) = self.items.remove(&item)
        else {
            return unknown_item(item);
        };
        let launch_remote = self.launch_remote(launch);
        let inner = self.inner.clone();
        let entity = format!("item {item}");

        let fut = {
            let entity = entity.clone();
            async move {
                // Children are finished before their parent, whatever their outcome.
                join_all(children).await;
                let launch_uuid = await_dependency(launch_remote?, &entity, "its launch").await?;
                let remote = await_dependency(remote, &entity, "the item").await?;
                let url = format!("{}/item/{remote}", inner.base_url);
                let body = WithLaunch {
                    launch_uuid: &launch_uuid,
                    request: &finish,
                };
                inner.send(inner.http.put(&url).json(&body), url).await?;
                Ok(())
            }
        };
        let completion = self.spawn(entity, fut);
        self.add_child_completion(parent, completion)
    }
}

impl Inner {
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: String,
    ) -> Result<reqwest::Response, ClientError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|error| ClientError::Request {
                url: url.clone(),
                error: Arc::new(error),
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::Status { url, status, body })
        }
    }

    /// Sends a create request and returns the id from its response.
    async fn create(
        &self,
        request: reqwest::RequestBuilder,
        url: String,
    ) -> Result<String, ClientError> {
        let response = self.send(request, url.clone()).await?;
        let created: EntryCreated =
            response
                .json()
                .await
                .map_err(|error| ClientError::Request {
                    url: url.clone(),
                    error: Arc::new(error),
                })?;
        match created.id {
            serde_json::Value::String(id) if !id.is_empty() => Ok(id),
            serde_json::Value::Number(id) => Ok(id.to_string()),
            _ => Err(ClientError::MissingId { url }),
        }
    }
}

impl ReportingClient for HttpReportingClient {
    fn start_launch(&mut self, launch: StartLaunch) -> CallHandle<LaunchUuid> {
        let id = LaunchUuid::new_v4();
        let inner = self.inner.clone();
        let fut = async move {
            let url = format!("{}/launch", inner.base_url);
            inner.create(inner.http.post(&url).json(&launch), url).await
        };
        let remote = self.spawn(format!("launch {id}"), fut).shared();
        self.launches.insert(id, remote.clone());
        debug!("issued create for launch {id}");

        CallHandle {
            id,
            completion: remote.map(|result| result.map(|_| ())).boxed(),
        }
    }

    fn start_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        item: StartItem,
    ) -> CallHandle<ItemUuid> {
        let (id, remote) = self.create_item(launch, parent, item);
        CallHandle {
            id,
            completion: remote.map(|result| result.map(|_| ())).boxed(),
        }
    }

    fn finish_item(
        &mut self,
        launch: LaunchUuid,
        item: ItemUuid,
        finish: FinishItem,
    ) -> Completion {
        self.finish_item_inner(launch, item, finish)
    }

    fn start_and_finish_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        start: StartItem,
        finish: FinishItem,
    ) -> CallHandle<ItemUuid> {
        // The backend has no combined endpoint, so this is one logical call
        // made of two requests, settling once both have.
        let (id, remote) = self.create_item(launch, parent, start);
        let finished = self.finish_item_inner(launch, id, finish);
        CallHandle {
            id,
            completion: async move {
                remote.await?;
                finished.await
            }
            .boxed(),
        }
    }

    fn send_log(&mut self, launch: LaunchUuid, item: ItemUuid, entry: LogEntry) -> Completion {
        let dependencies = self
            .launch_remote(launch)
            .and_then(|launch| Ok((launch, self.item_remote(item)?)));
        let inner = self.inner.clone();
        let entity = format!("log for item {item}");

        let fut = {
            let entity = entity.clone();
            async move {
                let (launch, item) = dependencies?;
                let launch_uuid = await_dependency(launch, &entity, "its launch").await?;
                let item_uuid = await_dependency(item, &entity, "its item").await?;
                let url = format!("{}/log", inner.base_url);
                let body = LogRequest {
                    launch_uuid: &launch_uuid,
                    item_uuid: &item_uuid,
                    level: entry.level,
                    message: &entry.message,
                    time: &entry.time,
                };
                inner.send(inner.http.post(&url).json(&body), url).await?;
                Ok(())
            }
        };
        let completion = self.spawn(entity, fut);
        self.add_child_completion(Some(item), completion)
    }

    fn finish_launch(&mut self, launch: LaunchUuid, finish: FinishLaunch) -> Completion {
        let remote = self.launch_remote(launch);
        let inner = self.inner.clone();
        let entity = format!("launch {launch}");

        let fut = {
            let entity = entity.clone();
            async move {
                let remote = await_dependency(remote?, &entity, "the launch").await?;
                let url = format!("{}/launch/{remote}/finish", inner.base_url);
                inner.send(inner.http.put(&url).json(&finish), url).await?;
                Ok(())
            }
        };
        self.spawn(entity, fut)
    }
}

async fn await_dependency(
    remote: RemoteId,
    entity: &str,
    dependency: &str,
) -> Result<String, ClientError> {
    remote.await.map_err(|_| ClientError::DependencyFailed {
        entity: entity.to_owned(),
        dependency: dependency.to_owned(),
    })
}

fn unknown_item(item: ItemUuid) -> Completion {
    futures::future::ready(Err(ClientError::UnknownEntity {
        kind: "item",
        id: item.to_string(),
    }))
    .boxed()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WithLaunch<'a, T> {
    launch_uuid: &'a str,
    #[serde(flatten)]
    request: &'a T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogRequest<'a> {
    launch_uuid: &'a str,
    item_uuid: &'a str,
    level: LogLevel,
    message: &'a str,
    time: &'a chrono::DateTime<chrono::FixedOffset>,
}

#[derive(Deserialize)]
struct EntryCreated {
    #[serde(default)]
    id: serde_json::Value,
}
