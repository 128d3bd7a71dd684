use metrics::describe_counter;

pub(crate) struct Metric {
    pub name: &'static str,
    description: &'static str,
}

pub(crate) const BUNDLE_UNLOADS_TOTAL: Metric = Metric {
    name: "vardar_balancer_bundle_unloads_total",
    description: "Total bundle unload commands dispatched by the shedding scheduler",
};

pub(crate) const BUNDLE_SPLITS_PROPOSED_TOTAL: Metric = Metric {
    name: "vardar_balancer_bundle_splits_proposed_total",
    description: "Total bundles proposed for splitting by the split scheduler",
};

/// Register metric descriptions with the installed recorder, if any.
pub(crate) fn describe() {
    describe_counter!(BUNDLE_UNLOADS_TOTAL.name, BUNDLE_UNLOADS_TOTAL.description);
    describe_counter!(
        BUNDLE_SPLITS_PROPOSED_TOTAL.name,
        BUNDLE_SPLITS_PROPOSED_TOTAL.description
    );
}
