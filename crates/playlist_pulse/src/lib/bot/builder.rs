use chrono_tz::Tz;
use token_store::TokenStore;

use crate::{
    accumulator::Accumulator, chat::ChatSource, publisher::PlaylistPublisher,
    types::EmptyWindowPolicy, yt::PlaylistHost, PlaylistBot,
};

pub struct PlaylistBotBuilder<C = (), P = (), S = ()> {
    chat: C,
    publisher: P,
    cursor_store: S,
    base_title: String,
    timezone: Tz,
    empty_window: EmptyWindowPolicy,
    ack_links: bool,
    max_sync_retries: u32,
}

impl PlaylistBotBuilder {
    pub fn new(base_title: impl Into<String>) -> Self {
        Self {
            chat: (),
            publisher: (),
            cursor_store: (),
            base_title: base_title.into(),
            timezone: Tz::UTC,
            empty_window: EmptyWindowPolicy::default(),
            ack_links: false,
            max_sync_retries: 5,
        }
    }
}

impl<C, P, S> PlaylistBotBuilder<C, P, S> {
    pub fn chat<C2: ChatSource + Send + Sync + 'static>(
        self,
        chat: C2,
    ) -> PlaylistBotBuilder<C2, P, S> {
        PlaylistBotBuilder {
            chat,
            publisher: self.publisher,
            cursor_store: self.cursor_store,
            base_title: self.base_title,
            timezone: self.timezone,
            empty_window: self.empty_window,
            ack_links: self.ack_links,
            max_sync_retries: self.max_sync_retries,
        }
    }

    pub fn publisher<H2: PlaylistHost + Send + Sync + 'static>(
        self,
        publisher: PlaylistPublisher<H2>,
    ) -> PlaylistBotBuilder<C, PlaylistPublisher<H2>, S> {
        PlaylistBotBuilder {
            chat: self.chat,
            publisher,
            cursor_store: self.cursor_store,
            base_title: self.base_title,
            timezone: self.timezone,
            empty_window: self.empty_window,
            ack_links: self.ack_links,
            max_sync_retries: self.max_sync_retries,
        }
    }

    pub fn cursor_store<S2: TokenStore + Send + Sync + 'static>(
        self,
        cursor_store: S2,
    ) -> PlaylistBotBuilder<C, P, S2> {
        PlaylistBotBuilder {
            chat: self.chat,
            publisher: self.publisher,
            cursor_store,
            base_title: self.base_title,
            timezone: self.timezone,
            empty_window: self.empty_window,
            ack_links: self.ack_links,
            max_sync_retries: self.max_sync_retries,
        }
    }

    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn empty_window(mut self, policy: EmptyWindowPolicy) -> Self {
        self.empty_window = policy;
        self
    }

    pub fn ack_links(mut self, ack_links: bool) -> Self {
        self.ack_links = ack_links;
        self
    }

    pub fn max_sync_retries(mut self, max_sync_retries: u32) -> Self {
        self.max_sync_retries = max_sync_retries;
        self
    }
}

impl<C, H, S> PlaylistBotBuilder<C, PlaylistPublisher<H>, S>
where
    C: ChatSource + Send + Sync + 'static,
    H: PlaylistHost + Send + Sync + 'static,
    S: TokenStore + Send + Sync + 'static,
{
    pub fn build(self) -> PlaylistBot<C, H, S> {
        PlaylistBot {
            chat: self.chat,
            publisher: self.publisher,
            cursor_store: self.cursor_store,
            accumulator: Accumulator::new(),
            base_title: self.base_title,
            timezone: self.timezone,
            empty_window: self.empty_window,
            ack_links: self.ack_links,
            max_sync_retries: self.max_sync_retries,
        }
    }
}
