// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::error::ErrorTranslator;
use crate::proxy::TransactionProxy;
use crate::session::Session;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub proxy: TransactionProxy,
    pub translator: ErrorTranslator,
}

impl AppState {
    pub fn new(session: Arc<Session>, translator: ErrorTranslator) -> Self {
        Self {
            proxy: TransactionProxy::new(session),
            translator,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        self.proxy.session()
    }
}
