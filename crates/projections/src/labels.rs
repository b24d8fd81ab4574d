//! Human-readable labels derived from a state code.
//!
//! The read side stores state as the code written by the write side. These
//! functions are total: any code they do not know, including the empty code
//! of a shell row, maps to [`UNKNOWN_STATE`].

use domain::SubmissionState;

/// Label shown for codes outside the known set.
pub const UNKNOWN_STATE: &str = "Estado desconocido";

const UNKNOWN_NEXT_STEP: &str = "Sin información disponible";

/// Display label and next-step hint for one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLabels {
    pub estado_legible: &'static str,
    pub siguiente_paso: &'static str,
    pub terminal: bool,
}

const UNKNOWN: StateLabels = StateLabels {
    estado_legible: UNKNOWN_STATE,
    siguiente_paso: UNKNOWN_NEXT_STEP,
    terminal: false,
};

/// Looks up the labels for a state code.
pub fn labels_for(code: &str) -> StateLabels {
    let Some(state) = SubmissionState::parse(code) else {
        return UNKNOWN;
    };

    let (estado_legible, siguiente_paso) = match state {
        SubmissionState::Drafted => ("Borrador", "Presentar el Formato A al coordinador"),
        SubmissionState::PresentedToCoordinator => (
            "En revisión por el coordinador",
            "Esperar la evaluación del Formato A",
        ),
        SubmissionState::CorrectionsRequested => (
            "Correcciones solicitadas",
            "Corregir y volver a presentar el Formato A",
        ),
        SubmissionState::FormatoAApproved => (
            "Formato A aprobado",
            "El director debe subir el anteproyecto",
        ),
        SubmissionState::FormatoARejectedFinal => (
            "Formato A rechazado definitivamente",
            "Ninguno, el proceso está cerrado",
        ),
        SubmissionState::AnteproyectoSubmitted => {
            ("Anteproyecto enviado", "Asignar dos evaluadores")
        }
        SubmissionState::EvaluatorsAssigned => (
            "Evaluadores asignados",
            "Esperar la evaluación del anteproyecto",
        ),
        SubmissionState::AnteproyectoApproved => {
            ("Anteproyecto aprobado", "Ninguno, el proceso finalizó")
        }
        SubmissionState::AnteproyectoRejected => {
            ("Anteproyecto rechazado", "Ninguno, el proceso está cerrado")
        }
    };

    StateLabels {
        estado_legible,
        siguiente_paso,
        terminal: state.is_terminal(),
    }
}

pub fn estado_legible(code: &str) -> &'static str {
    labels_for(code).estado_legible
}

pub fn siguiente_paso(code: &str) -> &'static str {
    labels_for(code).siguiente_paso
}

pub fn is_terminal(code: &str) -> bool {
    labels_for(code).terminal
}
