use prometheus::{
    histogram_opts, opts, Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct MintMetrics {
    pub submissions_total: IntCounter,
    pub confirmed_total: IntCounter,
    pub failures_total: IntCounterVec,
    pub sync_total: IntCounter,
    pub sync_failures_total: IntCounter,
    pub stale_results_total: IntCounter,
    pub confirmation_seconds: Histogram,
}

impl MintMetrics {
    pub fn new(reg: &Registry) -> prometheus::Result<Self> {
        let submissions_total =
            IntCounter::with_opts(opts!("mint_submissions_total", "Mint attempts started"))?;
        let confirmed_total =
            IntCounter::with_opts(opts!("mint_confirmed_total", "Mints confirmed without error"))?;
        let failures_total = IntCounterVec::new(
            opts!("mint_failures_total", "Mint attempts that failed, by kind"),
            &["kind"],
        )?;
        let sync_total = IntCounter::with_opts(opts!("sync_total", "Completed state syncs"))?;
        let sync_failures_total =
            IntCounter::with_opts(opts!("sync_failures_total", "State syncs aborted by a fetch error"))?;
        let stale_results_total = IntCounter::with_opts(opts!(
            "stale_results_total",
            "Fetch results discarded because the identity changed"
        ))?;
        let confirmation_seconds = Histogram::with_opts(histogram_opts!(
            "confirmation_seconds",
            "Time from submission to terminal confirmation status",
            vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 90.0]
        ))?;

        reg.register(Box::new(submissions_total.clone()))?;
        reg.register(Box::new(confirmed_total.clone()))?;
        reg.register(Box::new(failures_total.clone()))?;
        reg.register(Box::new(sync_total.clone()))?;
        reg.register(Box::new(sync_failures_total.clone()))?;
        reg.register(Box::new(stale_results_total.clone()))?;
        reg.register(Box::new(confirmation_seconds.clone()))?;

        Ok(Self {
            submissions_total,
            confirmed_total,
            failures_total,
            sync_total,
            sync_failures_total,
            stale_results_total,
            confirmation_seconds,
        })
    }

    /// Metrics registered on a throwaway registry.
    pub fn unregistered() -> Self {
        Self::new(&Registry::new()).expect("fresh registry accepts all collectors")
    }

    pub fn scrape(reg: &Registry) -> String {
        let mut buf = vec![];
        TextEncoder::new().encode(&reg.gather(), &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }
}
