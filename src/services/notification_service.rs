// src/services/notification_service.rs

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    common::error::AppError,
    db::store::LedgerStore,
    models::item::{Item, NotificationOutcome},
    services::recipient::{self, Recipient},
};

// Aviso de "pronto para retirada" para um endereço
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupNotice {
    pub recipient: String,
    pub internal_id: String,
    pub item_type: String,
}

impl PickupNotice {
    pub fn subject(&self) -> String {
        format!("Sua encomenda chegou! ({})", self.internal_id)
    }

    pub fn body(&self) -> String {
        format!(
            "Olá,\n\nSua encomenda ({}) com ID {} está disponível para retirada no Facilities.\n\nAtenciosamente,\nFacilities",
            self.item_type, self.internal_id
        )
    }
}

/// Despacho fora da transação. `true` quer dizer "aceito para envio",
/// não "entregue na caixa de entrada".
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notice: PickupNotice) -> bool;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notice: &PickupNotice) -> anyhow::Result<()>;
}

// Mailer padrão: só registra a mensagem no log (SMTP fica fora do serviço)
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, notice: &PickupNotice) -> anyhow::Result<()> {
        tracing::info!(
            to = %notice.recipient,
            subject = %notice.subject(),
            "📧 Aviso de retirada enviado"
        );
        tracing::debug!("{}", notice.body());
        Ok(())
    }
}

// ---
// Fila de saída (mpsc) + worker em segundo plano
// ---
pub struct OutboxDispatcher {
    tx: mpsc::Sender<PickupNotice>,
}

impl OutboxDispatcher {
    /// Cria a fila e sobe o worker que entrega cada aviso ao `mailer`.
    pub fn start(mailer: Arc<dyn Mailer>, buffer: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer);
        let worker = tokio::spawn(run_outbox(rx, mailer));
        (Self { tx }, worker)
    }
}

impl NotificationDispatcher for OutboxDispatcher {
    fn dispatch(&self, notice: PickupNotice) -> bool {
        if !notice.recipient.contains('@') {
            tracing::warn!("Destinatário sem e-mail válido: {:?}", notice.recipient);
            return false;
        }
        match self.tx.try_send(notice) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("⚠️ Fila de avisos indisponível: {}", e);
                false
            }
        }
    }
}

async fn run_outbox(mut rx: mpsc::Receiver<PickupNotice>, mailer: Arc<dyn Mailer>) {
    while let Some(notice) = rx.recv().await {
        // Falha de envio não volta para o núcleo e não é reenviada aqui
        if let Err(e) = mailer.send(&notice).await {
            tracing::warn!("⚠️ Falha ao enviar aviso para {}: {:#}", notice.recipient, e);
        }
    }
    tracing::info!("Fila de avisos encerrada");
}

// ---
// Serviço: resolve o destinatário e carimba `last_notified_at`
// ---
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn LedgerStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn LedgerStore>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Avisa o destinatário (ou cada membro do grupo). Grupo é resolvido agora,
    /// no momento do envio.
    pub async fn notify_item(&self, item: &Item) -> Result<NotificationOutcome, AppError> {
        let target = recipient::resolve(self.store.as_ref(), item.unit_id, item.effective_recipient()).await?;
        if target == Recipient::Unidentified {
            return Ok(NotificationOutcome::default());
        }

        let count = target
            .addresses()
            .into_iter()
            .filter(|address| {
                self.dispatcher.dispatch(PickupNotice {
                    recipient: address.to_string(),
                    internal_id: item.internal_id.clone(),
                    item_type: item.item_type.clone(),
                })
            })
            .count();

        if count > 0 {
            self.store.mark_notified(item.id, Utc::now()).await?;
        }

        tracing::info!("🔔 Encomenda {}: {} aviso(s) aceito(s)", item.internal_id, count);
        Ok(NotificationOutcome { sent: count > 0, count })
    }

    /// Reenvia para tudo que está pronto há mais de `after` sem novo aviso.
    pub async fn sweep_stale(&self, after: chrono::Duration) -> Result<usize, AppError> {
        let cutoff = Utc::now() - after;
        let stale = self.store.stale_ready_items(cutoff).await?;

        let mut notified = 0;
        for item in &stale {
            match self.notify_item(item).await {
                Ok(outcome) if outcome.sent => notified += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!("⚠️ Lembrete falhou para {}: {}", item.internal_id, e),
            }
        }
        Ok(notified)
    }
}

/// Tarefa periódica de lembretes (itens não retirados).
pub async fn reminder_task(service: NotificationService, interval: Duration, after: chrono::Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match service.sweep_stale(after).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("⏰ Lembretes reenviados para {} encomenda(s)", n),
            Err(e) => tracing::error!("Falha na varredura de lembretes: {}", e),
        }
    }
}
