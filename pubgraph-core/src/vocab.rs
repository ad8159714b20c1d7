//! Vocabulary IRIs used by the engine
//!
//! Centralized so query builders and the job model never spell out raw IRIs
//! inline. Organized by vocabulary, one module each.

/// RDF vocabulary
pub mod rdf {
    /// rdf:type IRI
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
}

/// XSD vocabulary
pub mod xsd {
    /// xsd:dateTime IRI
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
}

/// Core identifier vocabulary
pub mod mu {
    /// mu:uuid
    pub const UUID: &str = "http://mu.semte.ch/vocabularies/core/uuid";
}

/// Dublin Core terms
pub mod dct {
    pub const IS_PART_OF: &str = "http://purl.org/dc/terms/isPartOf";
    pub const CREATED: &str = "http://purl.org/dc/terms/created";
    pub const MODIFIED: &str = "http://purl.org/dc/terms/modified";
    pub const SUBJECT: &str = "http://purl.org/dc/terms/subject";
}

/// Job vocabulary (cogs)
pub mod cogs {
    /// cogs:Job class
    pub const JOB: &str = "http://vocab.deri.ie/cogs#Job";
}

/// Task vocabulary
pub mod task {
    pub const TASK: &str = "http://redpencil.data.gift/vocabularies/tasks/Task";
    pub const OPERATION: &str = "http://redpencil.data.gift/vocabularies/tasks/operation";
    pub const RESULTS_CONTAINER: &str =
        "http://redpencil.data.gift/vocabularies/tasks/resultsContainer";
    pub const DATA_CONTAINER: &str = "http://redpencil.data.gift/vocabularies/tasks/DataContainer";
    pub const ERROR: &str = "http://redpencil.data.gift/vocabularies/tasks/error";
    pub const INDEX: &str = "http://redpencil.data.gift/vocabularies/tasks/index";
}

/// ADMS status property
pub mod adms {
    pub const STATUS: &str = "http://www.w3.org/ns/adms#status";
}

/// OSLC error reporting
pub mod oslc {
    pub const ERROR: &str = "http://open-services.net/ns/core#Error";
    pub const MESSAGE: &str = "http://open-services.net/ns/core#message";
}

/// File/data-source linking
pub mod nie {
    pub const DATA_SOURCE: &str =
        "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#dataSource";
}

/// Job status concept URIs
pub mod job_status {
    pub const SCHEDULED: &str = "http://redpencil.data.gift/id/concept/JobStatus/scheduled";
    pub const BUSY: &str = "http://redpencil.data.gift/id/concept/JobStatus/busy";
    pub const SUCCESS: &str = "http://redpencil.data.gift/id/concept/JobStatus/success";
    pub const FAILED: &str = "http://redpencil.data.gift/id/concept/JobStatus/failed";
    pub const CANCELED: &str = "http://redpencil.data.gift/id/concept/JobStatus/canceled";
}

/// Operation URIs for the two reconciliation flavors
pub mod operation {
    pub const INITIAL_SYNC: &str =
        "http://redpencil.data.gift/id/jobs/concept/JobOperation/deltas/initialPublicationGraphSyncing";
    pub const HEALING: &str =
        "http://redpencil.data.gift/id/jobs/concept/JobOperation/deltas/healingOperation";
}
