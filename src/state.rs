use crate::{
    config::RuntimeConfiguration,
    error::{GetDatabaseConnectionSnafu, MadrassaResult, MigrateSnafu, OpenDatabaseSnafu},
    maud_conveniences::{Role, render_nav},
    routes::sse::SseEvent,
};
use maud::{DOCTYPE, Markup, html};
use snafu::ResultExt;
use sqlx::{Pool, Postgres, pool::PoolConnection, postgres::PgPoolOptions};
use std::ops::Deref;
use tokio::sync::broadcast::{Receiver, Sender, channel};

/// Lets htmx swap error responses too, so the out-of-band toast in them gets shown.
const HTMX_CONFIG: &str = r#"{"responseHandling":[{"code":"204","swap":false},{"code":"...","swap":true}]}"#;

#[derive(Clone, Debug)]
pub struct MadrassaState {
    pool: Pool<Postgres>,
    config: RuntimeConfiguration,
    sse_events_sender: Sender<SseEvent>,
}

impl MadrassaState {
    pub async fn new(options: PgPoolOptions, config: RuntimeConfiguration) -> MadrassaResult<Self> {
        let pool = options
            .connect(&config.db_config().get_db_path())
            .await
            .context(OpenDatabaseSnafu)?;

        sqlx::migrate!().run(&pool).await.context(MigrateSnafu)?;

        let (tx, _rx) = channel(16);

        Ok(Self {
            pool,
            config,
            sse_events_sender: tx,
        })
    }

    pub const fn config(&self) -> &RuntimeConfiguration {
        &self.config
    }

    #[allow(clippy::unused_self, clippy::needless_pass_by_value)] //in case self is ever needed :), and to allow direct html! usage
    pub fn render(&self, role: Role, markup: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    meta name="htmx-config" content=(HTMX_CONFIG) {}
                    script src="https://unpkg.com/htmx.org@2.0.4" integrity="sha384-HGfztofotfshcF7+8n44JQL2oJmowVChPTg48S+jvZoztPfvwD79OC/LTtG6dMp+" crossorigin="anonymous" {}
                    script src="https://unpkg.com/htmx-ext-sse@2.2.3" integrity="sha384-Y4gc0CK6Kg+hmulDc6rZPJu0tqvk7EWlih0Oh+2OkAi1ZDlCbBDCQEE2uVk472Ky" crossorigin="anonymous" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "myMadrassa" }
                }
                body hx-ext="sse" sse-connect="/sse_feed" class="bg-gray-900 min-h-screen flex flex-col items-center text-white" {
                    (render_nav(role))
                    main class="w-full max-w-6xl p-6 flex flex-col space-y-6" {
                        (markup)
                    }
                    div id="dialog" {}
                    div id="toasts" class="fixed bottom-4 right-4 flex flex-col" {}
                }
            }
        }
    }

    pub async fn get_connection(&self) -> MadrassaResult<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    pub fn subscribe_to_sse_feed(&self) -> Receiver<SseEvent> {
        self.sse_events_sender.subscribe()
    }

    pub fn send_sse_event(&self, event: SseEvent) {
        //no receivers just means nobody has a page open
        let _ = self.sse_events_sender.send(event);
    }

    pub async fn sensible_shutdown(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }
}

impl Deref for MadrassaState {
    type Target = Pool<Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}
