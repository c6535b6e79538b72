use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("youtube-analytics-agent"));

// --- YouTube Data API ---

pub static YOUTUBE_API_REQUESTS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("youtube.api.requests")
        .with_description("YouTube Data API calls by endpoint and outcome")
        .with_unit("{request}")
        .build()
});

pub static YOUTUBE_API_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("youtube.api.duration")
        .with_description("Duration of YouTube Data API calls in seconds")
        .with_unit("s")
        .build()
});

pub static YOUTUBE_API_RETRY_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("youtube.api.retry.count")
        .with_description("Number of retried YouTube Data API calls")
        .with_unit("{retry}")
        .build()
});

pub static YOUTUBE_QUOTA_UNITS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("youtube.api.quota.units")
        .with_description("YouTube Data API quota units consumed")
        .with_unit("{unit}")
        .build()
});

// --- Tools ---

pub static TOOL_INVOCATIONS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("agent.tool.invocations")
        .with_description("Tool invocations by tool name and outcome")
        .with_unit("{invocation}")
        .build()
});

pub static TOOL_INVOCATION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("agent.tool.duration")
        .with_description("Tool invocation duration in seconds")
        .with_unit("s")
        .build()
});

// --- LLM Gateway ---

pub static GEN_AI_TOKEN_USAGE: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.token.usage")
        .with_description("Number of tokens used per LLM call")
        .with_unit("{token}")
        .build()
});

pub static GEN_AI_OPERATION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.operation.duration")
        .with_description("Duration of LLM operations in seconds")
        .with_unit("s")
        .build()
});

pub static GEN_AI_COST: LazyLock<Counter<f64>> = LazyLock::new(|| {
    METER
        .f64_counter("gen_ai.client.cost")
        .with_description("Estimated cost of LLM operations in USD")
        .with_unit("usd")
        .build()
});

pub static GEN_AI_RETRY_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.retry.count")
        .with_description("Number of LLM call retries")
        .with_unit("{retry}")
        .build()
});

pub static GEN_AI_FALLBACK_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.fallback.count")
        .with_description("Number of LLM fallback activations")
        .with_unit("{fallback}")
        .build()
});

pub static GEN_AI_ERROR_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.error.count")
        .with_description("Number of LLM call errors")
        .with_unit("{error}")
        .build()
});

// --- Reports ---

pub static REPORT_GENERATION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.generation.duration")
        .with_description("Total analytics report generation duration in seconds")
        .with_unit("s")
        .build()
});

pub static REPORT_VIDEOS_ANALYZED: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.videos_analyzed")
        .with_description("Videos sampled per analytics report")
        .with_unit("{video}")
        .build()
});

pub static REPORT_COMPETITORS_FOUND: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.competitors_found")
        .with_description("Competitor channels kept per analytics report")
        .with_unit("{channel}")
        .build()
});

// --- HTTP ---

pub static HTTP_REQUESTS_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("http.requests.total")
        .with_description("Total number of HTTP requests")
        .with_unit("{request}")
        .build()
});

pub static HTTP_REQUEST_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("http.request.duration")
        .with_description("HTTP request duration in milliseconds")
        .with_unit("ms")
        .with_boundaries(vec![
            1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
        ])
        .build()
});
