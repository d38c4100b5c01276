#[macro_export]
macro_rules! operation_metrics {
    ($operation:expr, $result:expr) => {{
        let result = $result;
        metrics::counter!("ledger_operations_total", "operation" => $operation.to_string())
            .increment(1);
        if result.is_err() {
            metrics::counter!("ledger_operation_errors_total", "operation" => $operation.to_string())
                .increment(1);
        }
        result
    }};
}

#[macro_export]
macro_rules! event_published_metrics {
    ($event_type:expr) => {{
        metrics::counter!("ledger_events_published", "type" => $event_type.to_string()).increment(1);
    }};
}
