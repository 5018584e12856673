//! Session input/output abstraction.

use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Incoming question from the user.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub text: String,
}

/// Bidirectional communication channel for the session loop.
pub trait Channel: Send {
    /// Receive the next question. Returns `None` when the session ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I/O fails.
    fn recv(&mut self)
    -> impl Future<Output = Result<Option<ChannelMessage>, ChannelError>> + Send;

    /// Send an answer to the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I/O fails.
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// True when the input ends the session.
#[must_use]
pub fn is_exit_command(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit")
}

/// CLI channel reading questions from stdin and printing answers to stdout.
#[derive(Debug, Default)]
pub struct CliChannel;

impl CliChannel {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Channel for CliChannel {
    async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
        loop {
            let line = tokio::task::spawn_blocking(|| {
                print!("Question: ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                let read = std::io::stdin().read_line(&mut line)?;
                Ok::<_, std::io::Error>((read, line))
            })
            .await
            .map_err(|e| ChannelError::Other(e.to_string()))?;

            let (read, line) = line?;
            if read == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if is_exit_command(trimmed) {
                return Ok(None);
            }
            return Ok(Some(ChannelMessage {
                text: trimmed.to_owned(),
            }));
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        println!("{text}\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands_are_case_insensitive() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(is_exit_command("  Exit  "));
    }

    #[test]
    fn questions_are_not_exit_commands() {
        assert!(!is_exit_command("how did revenue change?"));
        assert!(!is_exit_command("exit strategy of the company"));
        assert!(!is_exit_command(""));
    }

    struct ScriptedChannel {
        inputs: Vec<String>,
        sent: Vec<String>,
    }

    impl Channel for ScriptedChannel {
        async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
            Ok(if self.inputs.is_empty() {
                None
            } else {
                Some(ChannelMessage {
                    text: self.inputs.remove(0),
                })
            })
        }

        async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
            self.sent.push(text.to_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn scripted_channel_drains_then_ends() {
        let mut channel = ScriptedChannel {
            inputs: vec!["q1".into()],
            sent: Vec::new(),
        };
        assert_eq!(channel.recv().await.unwrap().unwrap().text, "q1");
        assert!(channel.recv().await.unwrap().is_none());
        channel.send("a1").await.unwrap();
        assert_eq!(channel.sent, vec!["a1"]);
    }
}
