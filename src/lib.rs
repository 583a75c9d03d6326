// src/lib.rs

#![doc = r#"
# Hookwatch

Hookwatch watches a directory tree and periodically posts a single batched
summary of created, deleted, renamed and moved files to a webhook.

## Modules

- [`config`]: Configuration loading and merging from CLI, file, and environment.
- [`error`]: Error types for configuration, watching, and delivery.
- [`event`]: File event struct produced by the watcher.
- [`buffer`]: Shared event buffer between collector and dispatcher.
- [`watcher`]: File system watcher for change detection.
- [`collector`]: Moves watcher events into the buffer.
- [`notification`]: Groups buffered events into a webhook message.
- [`webhook`]: HTTP delivery of webhook messages.
- [`dispatcher`]: Periodic drain, build and send loop.
"#]

pub mod buffer;
pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod notification;
pub mod watcher;
pub mod webhook;
