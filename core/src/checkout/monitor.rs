// core/src/checkout/monitor.rs

//! The timer tasks that settle an in-page payment: a fixed-interval status poller and a
//! jittered webhook delivery with bounded retries.

use super::session::CheckoutSession;
use super::system::CheckoutSystem;
use crate::provider::{RemotePaymentStatus, WebhookDelivery};
use rand::Rng;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, instrument, warn};

impl CheckoutSystem {
  /// Spawns both monitors for `payment_id` and registers them with `session` so they can
  /// be cancelled.
  pub(super) fn spawn_monitors(&self, session: &mut CheckoutSession, payment_id: &str) {
    let poller = tokio::spawn(self.clone().poll_payment_status(payment_id.to_string()));
    session.add_timer(poller.abort_handle());

    let webhook = tokio::spawn(self.clone().deliver_webhooks(payment_id.to_string()));
    session.add_timer(webhook.abort_handle());
  }

  /// First tick one interval after start. Transport errors are tolerated until the ceiling.
  #[instrument(name = "payment_poller", skip(self), fields(max_polls = self.config.max_polls))]
  async fn poll_payment_status(self, payment_id: String) {
    let period = self.config.poll_interval;
    let max_polls = self.config.max_polls;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      ticker.tick().await;
      let Some(poll_count) = self.record_poll() else {
        debug!("Payment no longer processing; poller stops.");
        return;
      };

      match self.provider.get_payment_status(&payment_id).await {
        Ok(RemotePaymentStatus::Completed) => {
          self.handle_payment_success(Some(&payment_id));
          return;
        }
        Ok(RemotePaymentStatus::Failed) => {
          self.handle_payment_failure(Some(&payment_id), "Payment failed");
          return;
        }
        Ok(RemotePaymentStatus::Pending) => {
          debug!(poll_count, "Payment still pending.");
        }
        Err(e) => {
          warn!(poll_count, error = %e, "Payment status poll failed.");
        }
      }

      if poll_count >= max_polls {
        self.handle_payment_timeout(&payment_id);
        return;
      }
      self.show_polling_status(poll_count);
    }
  }

  #[instrument(name = "webhook_delivery", skip(self))]
  async fn deliver_webhooks(self, payment_id: String) {
    let mut delay = self.webhook_delay(Duration::ZERO);

    loop {
      time::sleep(delay).await;
      match self.provider.deliver_webhook(&payment_id).await {
        Ok(WebhookDelivery::Delivered) => {
          self.handle_webhook_success(&payment_id);
          return;
        }
        Ok(WebhookDelivery::Failed) => {}
        Err(e) => warn!(error = %e, "Webhook delivery errored."),
      }

      if !self.handle_webhook_failure(&payment_id) {
        debug!("Webhook retries exhausted; polling decides the outcome.");
        return;
      }
      delay = self.webhook_delay(self.config.webhook_retry_backoff);
    }
  }

  /// `base` plus a random delay from the configured jitter window.
  fn webhook_delay(&self, base: Duration) -> Duration {
    let min = self.config.webhook_delay_min;
    let max = self.config.webhook_delay_max;
    let jitter = if max > min {
      let span = (max - min).as_millis() as u64;
      min + Duration::from_millis(rand::thread_rng().gen_range(0..=span))
    } else {
      min
    };
    base + jitter
  }
}
