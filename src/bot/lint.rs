use super::{BotError, Dispatcher};
use crate::dialogue::DialogueState;
use crate::lint::{strip_code_fence, truncate_report, LintError};
use crate::telegram_client::escape_html;

impl Dispatcher {
    pub(super) async fn start_lint(&self, chat_id: i64, user_id: i64) -> Result<(), BotError> {
        self.dialogues
            .set(user_id, &DialogueState::AwaitingCode)
            .await?;

        self.reply(chat_id, "Send me the Python code to check.")
            .await
    }

    #[tracing::instrument(name = "Linting code from the chat", skip(self, text))]
    pub(super) async fn lint_code(
        &self,
        chat_id: i64,
        user_id: i64,
        text: &str,
    ) -> Result<(), BotError> {
        self.dialogues.clear(user_id).await?;

        let code = strip_code_fence(text);
        let reply = match self.lint_runner.run(&code).await {
            Ok(report) if report.is_empty() => String::from("No issues found!"),
            Ok(report) => format!("<pre>{}</pre>", escape_html(&truncate_report(&report))),
            Err(LintError::TimedOut) => {
                String::from("The check took too long and was stopped. Try a shorter snippet.")
            }
            Err(err) => {
                tracing::error!("Failed to lint a snippet: {:?}", err);
                String::from("Sorry, I could not check your code right now.")
            }
        };

        self.reply(chat_id, &reply).await
    }
}
