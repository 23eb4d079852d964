//! Unread/mention bookkeeping and the badge derived from it.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::views::ViewId;

/// Aggregate across every view, as shown on the dock/taskbar and tray.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadTotals {
    pub mentions: u32,
    pub unreads: bool,
    pub expired: bool,
}

#[derive(Debug, Default)]
pub struct UnreadState {
    mentions: HashMap<ViewId, u32>,
    unreads: HashSet<ViewId>,
    expired: HashSet<String>,
}

impl UnreadState {
    pub fn set_mentions(&mut self, view: ViewId, count: u32) {
        if count == 0 {
            self.mentions.remove(&view);
        } else {
            self.mentions.insert(view, count);
        }
    }

    pub fn set_unreads(&mut self, view: ViewId, unread: bool) {
        if unread {
            self.unreads.insert(view);
        } else {
            self.unreads.remove(&view);
        }
    }

    pub fn set_session_expired(&mut self, server_id: &str, expired: bool) {
        if expired {
            self.expired.insert(server_id.to_string());
        } else {
            self.expired.remove(server_id);
        }
    }

    pub fn clear_view(&mut self, view: &ViewId) {
        self.mentions.remove(view);
        self.unreads.remove(view);
    }

    /// Forget everything recorded for any view of `server_id`.
    pub fn clear_server(&mut self, server_id: &str) {
        self.mentions.retain(|v, _| v.server_id != server_id);
        self.unreads.retain(|v| v.server_id != server_id);
        self.expired.remove(server_id);
    }

    pub fn mentions_for_server(&self, server_id: &str) -> u32 {
        self.mentions
            .iter()
            .filter(|(v, _)| v.server_id == server_id)
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn totals(&self) -> UnreadTotals {
        UnreadTotals {
            mentions: self.mentions.values().sum(),
            unreads: !self.unreads.is_empty(),
            expired: !self.expired.is_empty(),
        }
    }
}

/// Text for the dock/taskbar badge, `None` to clear it.
pub fn badge_text(totals: UnreadTotals, show_unread_badge: bool) -> Option<String> {
    if totals.mentions > 0 {
        if cfg!(target_os = "windows") && totals.mentions > 99 {
            return Some("99+".to_string());
        }
        return Some(totals.mentions.to_string());
    }
    if totals.unreads && show_unread_badge {
        return Some("•".to_string());
    }
    if totals.expired {
        return Some("!".to_string());
    }
    None
}

/// Numeric launcher badge used on Linux, which cannot show text.
pub fn linux_badge_count(totals: UnreadTotals) -> i64 {
    i64::from(totals.mentions) + i64::from(totals.expired)
}
