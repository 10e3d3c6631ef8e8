#![cfg(test)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{span, Subscriber};
use tracing_core::field::{Field, Visit};
use tracing_subscriber::registry;
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

#[derive(Default, Debug)]
pub struct SpanData {
    pub name: String,
    pub fields: Mutex<HashMap<String, String>>, // stringified values
}

#[derive(Default, Debug)]
pub struct SpanStore {
    pub spans: Mutex<Vec<(span::Id, Arc<SpanData>)>>,
}

impl SpanStore {
    /// Fields of the first span named `name`, if one was opened.
    pub fn fields_of(&self, name: &str) -> Option<HashMap<String, String>> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .find(|(_, d)| d.name == name)
            .map(|(_, d)| d.fields.lock().unwrap().clone())
    }
}

struct MapVisitor<'a> {
    map: &'a mut HashMap<String, String>,
}

impl Visit for MapVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
        self.map.insert(field.name().to_string(), format!("{value:?}"));
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
}

#[derive(Clone)]
pub struct CaptureLayer {
    pub store: Arc<SpanStore>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, _ctx: Context<'_, S>) {
        let data = Arc::new(SpanData {
            name: attrs.metadata().name().to_string(),
            ..Default::default()
        });
        attrs.record(&mut MapVisitor {
            map: &mut *data.fields.lock().unwrap(),
        });
        self.store.spans.lock().unwrap().push((id.clone(), data));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
        let spans = self.store.spans.lock().unwrap();
        if let Some((_, data)) = spans.iter().find(|(sid, _)| sid == id) {
            values.record(&mut MapVisitor {
                map: &mut *data.fields.lock().unwrap(),
            });
        }
    }
}

/// Install a capturing subscriber as the default for the current thread.
/// The returned guard must be held for as long as capture is needed.
pub fn install_capture() -> (Arc<SpanStore>, tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::prelude::*;
    let store = Arc::new(SpanStore::default());
    let layer = CaptureLayer {
        store: store.clone(),
    };
    let subscriber = registry::Registry::default().with(layer);
    let guard = tracing::subscriber::set_default(subscriber);
    (store, guard)
}
