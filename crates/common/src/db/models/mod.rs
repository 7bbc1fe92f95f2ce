//! SeaORM entity models
//!
//! Client records, therapy sessions and notes. Catalog tables are queried
//! through the shared visibility builder in the repository instead.

mod client;
mod client_behavior;
mod client_intervention;
mod client_intervention_behavior;
mod client_replacement_program;
mod client_replacement_program_behavior;
mod session_abc;
mod session_note;
mod therapy_session;

pub use client::{
    Entity as ClientEntity,
    Model as Client,
    ActiveModel as ClientActiveModel,
    Column as ClientColumn,
};

pub use client_behavior::{
    Entity as ClientBehaviorEntity,
    Model as ClientBehavior,
    ActiveModel as ClientBehaviorActiveModel,
    Column as ClientBehaviorColumn,
    BehaviorType,
};

pub use client_intervention::{
    Entity as ClientInterventionEntity,
    Model as ClientIntervention,
    ActiveModel as ClientInterventionActiveModel,
    Column as ClientInterventionColumn,
};

pub use client_replacement_program::{
    Entity as ClientReplacementProgramEntity,
    Model as ClientReplacementProgram,
    ActiveModel as ClientReplacementProgramActiveModel,
    Column as ClientReplacementProgramColumn,
};

pub use client_intervention_behavior::{
    Entity as ClientInterventionBehaviorEntity,
    Model as ClientInterventionBehavior,
    ActiveModel as ClientInterventionBehaviorActiveModel,
    Column as ClientInterventionBehaviorColumn,
};

pub use client_replacement_program_behavior::{
    Entity as ClientReplacementProgramBehaviorEntity,
    Model as ClientReplacementProgramBehavior,
    ActiveModel as ClientReplacementProgramBehaviorActiveModel,
    Column as ClientReplacementProgramBehaviorColumn,
};

pub use therapy_session::{
    Entity as TherapySessionEntity,
    Model as TherapySession,
    ActiveModel as TherapySessionActiveModel,
    Column as TherapySessionColumn,
    SessionStatus,
};

pub use session_abc::{
    Entity as SessionAbcEntity,
    Model as SessionAbc,
    ActiveModel as SessionAbcActiveModel,
    Column as SessionAbcColumn,
};

pub use session_note::{
    Entity as SessionNoteEntity,
    Model as SessionNote,
    ActiveModel as SessionNoteActiveModel,
    Column as SessionNoteColumn,
};
