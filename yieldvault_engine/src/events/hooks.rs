use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    PaymentInstructionsReadyEvent,
    PositionStatusChangedEvent,
};

/// The producer ends handed to the reconciliation engine and the admin workflow. Cloneable;
/// publishing to an empty producer list is a no-op.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub status_changed_producer: Vec<EventProducer<PositionStatusChangedEvent>>,
    pub instructions_ready_producer: Vec<EventProducer<PaymentInstructionsReadyEvent>>,
}

pub struct EventHandlers {
    pub on_status_changed: Option<EventHandler<PositionStatusChangedEvent>>,
    pub on_instructions_ready: Option<EventHandler<PaymentInstructionsReadyEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_status_changed = hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_instructions_ready = hooks.on_instructions_ready.map(|f| EventHandler::new(buffer_size, f));
        Self { on_status_changed, on_instructions_ready }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_instructions_ready {
            result.instructions_ready_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_instructions_ready {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_status_changed: Option<Handler<PositionStatusChangedEvent>>,
    pub on_instructions_ready: Option<Handler<PaymentInstructionsReadyEvent>>,
}

impl EventHooks {
    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PositionStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_instructions_ready<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentInstructionsReadyEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_instructions_ready = Some(Arc::new(f));
        self
    }
}
