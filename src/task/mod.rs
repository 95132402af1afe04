use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::TransferConfig;
use crate::error::TransferErrorKind;
use crate::file::ContentSource;
use crate::progress::{TransferContext, TransferEvent};
use crate::receiver::Receiver;
use crate::sender::Sender;
use crate::state::{TransferResult, TransferRole};

/// A transfer running on a background task.
///
/// Dropping the handle does not stop the transfer; call `cancel`.
pub struct TransferHandle {
    transfer_id: Uuid,
    role: TransferRole,
    cancel: CancellationToken,
    join: JoinHandle<TransferResult>,
}

impl TransferHandle {
    pub fn transfer_id(&self) -> Uuid {
        self.transfer_id
    }

    pub fn role(&self) -> TransferRole {
        self.role
    }

    /// Interrupt a pending accept/connect or a running copy
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the one outcome of this transfer
    pub async fn result(self) -> TransferResult {
        match self.join.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Transfer task {} ended abnormally: {}", self.transfer_id, e);
                TransferResult::failure_with(
                    self.transfer_id,
                    self.role,
                    TransferErrorKind::Io,
                    format!("transfer task ended abnormally: {}", e),
                    Duration::ZERO,
                )
            }
        }
    }

    /// Wait for the outcome, cancelling first if `interrupt` completes.
    ///
    /// The task's own cleanup (partial file removal, socket close) has run
    /// by the time this returns. The flag tells whether `interrupt` fired.
    pub async fn result_or_cancel<F>(self, interrupt: F) -> (TransferResult, bool)
    where
        F: Future,
    {
        let cancel = self.cancel.clone();
        let result = self.result();
        tokio::pin!(result);

        tokio::select! {
            outcome = &mut result => (outcome, false),
            _ = interrupt => {
                cancel.cancel();
                (result.await, true)
            }
        }
    }
}

/// Run an already bound receiver in the background
pub fn spawn_receiver(receiver: Receiver, ctx: TransferContext) -> TransferHandle {
    let transfer_id = receiver.transfer_id();
    let cancel = ctx.cancellation().clone();

    let join = tokio::spawn(async move { receiver.receive(&ctx).await });

    TransferHandle {
        transfer_id,
        role: TransferRole::Receiver,
        cancel,
        join,
    }
}

/// Bind and receive in the background; a bind failure is reported through
/// the handle's result like any other failure.
pub fn spawn_receive(config: TransferConfig, ctx: TransferContext) -> TransferHandle {
    let transfer_id = Uuid::new_v4();
    let cancel = ctx.cancellation().clone();

    let join = tokio::spawn(async move {
        match Receiver::bind_with_id(config, transfer_id).await {
            Ok(receiver) => receiver.receive(&ctx).await,
            Err(e) => {
                tracing::error!("Receiver {} could not start: {}", transfer_id, e);
                ctx.emit(TransferEvent::Failed { error: e.to_string() });
                TransferResult::failure(transfer_id, TransferRole::Receiver, &e, Duration::ZERO)
            }
        }
    });

    TransferHandle {
        transfer_id,
        role: TransferRole::Receiver,
        cancel,
        join,
    }
}

/// Run a send in the background
pub fn spawn_sender<S>(sender: Sender, source: S, ctx: TransferContext) -> TransferHandle
where
    S: ContentSource + 'static,
{
    let transfer_id = sender.transfer_id();
    let cancel = ctx.cancellation().clone();

    let join = tokio::spawn(async move { sender.send(&source, &ctx).await });

    TransferHandle {
        transfer_id,
        role: TransferRole::Sender,
        cancel,
        join,
    }
}
