use futures::channel::oneshot;
use tracing::error;
use trainer_client_core::ClientError;
use trainer_shared::internal_error;

#[derive(Debug)]
pub struct AwaitingType<T>(pub oneshot::Receiver<Result<T, ClientError>>);

/// Progress of one request started from the UI
#[derive(Debug, Default)]
pub enum DataState<T> {
    #[default]
    None,
    AwaitingResponse(AwaitingType<T>),
    Present(T),
    Failed(String),
}

impl<T> DataState<T> {
    pub fn start(&mut self, rx: oneshot::Receiver<Result<T, ClientError>>) {
        *self = Self::AwaitingResponse(AwaitingType(rx));
    }

    /// Moves on if the response arrived. Shows a spinner while waiting and
    /// the error (with a way to clear it) on failure if a ui is passed.
    pub fn poll(&mut self, ui: Option<&mut egui::Ui>) {
        match self {
            DataState::AwaitingResponse(rx) => {
                if let Some(new_state) = Self::await_data(ui, rx) {
                    *self = new_state;
                }
            }
            DataState::Failed(e) => {
                if let Some(ui) = ui {
                    ui.colored_label(ui.visuals().error_fg_color, e.as_str());
                    if ui.button("Dismiss").clicked() {
                        *self = DataState::default();
                    }
                }
            }
            DataState::None | DataState::Present(_) => {}
        }
    }

    pub fn await_data(ui: Option<&mut egui::Ui>, rx: &mut AwaitingType<T>) -> Option<Self> {
        Some(match rx.0.try_recv() {
            Ok(recv_opt) => match recv_opt {
                Some(outcome_result) => match outcome_result {
                    Ok(data) => DataState::Present(data),
                    Err(e) => {
                        let err_msg = e.to_string();
                        if !e.is_validation() {
                            error!(err_msg, "Error response received instead of the data");
                        }
                        DataState::Failed(err_msg)
                    }
                },
                None => {
                    if let Some(ui) = ui {
                        ui.spinner();
                    }
                    return None;
                }
            },
            Err(e) => DataState::Failed(internal_error!(format!(
                "Error receiving on channel. Error: {e:?}"
            ))),
        })
    }

    /// Returns `true` if the data state is [`Present`].
    ///
    /// [`Present`]: DataState::Present
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(..))
    }

    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::AwaitingResponse(..))
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Self::Present(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use trainer_shared::errors::ValidationError;

    use super::*;

    #[test]
    fn waits_then_presents() {
        let (tx, rx) = oneshot::channel();
        let mut state = DataState::<u8>::default();
        state.start(rx);

        state.poll(None);
        assert!(state.is_awaiting());

        tx.send(Ok(7)).unwrap();
        state.poll(None);
        assert_eq!(state.present(), Some(&7));
    }

    #[test]
    fn error_message_kept_for_display() {
        let (tx, rx) = oneshot::channel();
        let mut state = DataState::<u8>::default();
        state.start(rx);

        tx.send(Err(ValidationError::PasswordMismatch.into())).unwrap();
        state.poll(None);

        assert!(matches!(state, DataState::Failed(msg) if msg == "Passwords do not match"));
    }

    #[test]
    fn dropped_sender_fails() {
        let (tx, rx) = oneshot::channel::<Result<u8, ClientError>>();
        let mut state = DataState::default();
        state.start(rx);

        drop(tx);
        state.poll(None);

        assert!(matches!(state, DataState::Failed(_)));
    }
}
