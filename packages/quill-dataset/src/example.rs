use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub role: Role,
	pub content: String,
}

#[derive(Serialize, Deserialize)]
struct ExampleRecord {
	messages: Vec<Message>,
}

/// One fine-tuning record: a system message, the user turn, and the expected assistant reply.
///
/// Serializes as `{"messages":[{"role":"system",...},{"role":"user",...},{"role":"assistant",...}]}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ExampleRecord", try_from = "ExampleRecord")]
pub struct TrainingExample {
	system: String,
	user: String,
	assistant: String,
}
impl TrainingExample {
	pub fn new(
		system: impl Into<String>,
		user: impl Into<String>,
		assistant: impl Into<String>,
	) -> Self {
		Self { system: system.into(), user: user.into(), assistant: assistant.into() }
	}

	pub fn system(&self) -> &str {
		&self.system
	}

	pub fn user(&self) -> &str {
		&self.user
	}

	pub fn assistant(&self) -> &str {
		&self.assistant
	}
}

impl From<TrainingExample> for ExampleRecord {
	fn from(example: TrainingExample) -> Self {
		Self {
			messages: vec![
				Message { role: Role::System, content: example.system },
				Message { role: Role::User, content: example.user },
				Message { role: Role::Assistant, content: example.assistant },
			],
		}
	}
}

impl TryFrom<ExampleRecord> for TrainingExample {
	type Error = String;

	fn try_from(record: ExampleRecord) -> Result<Self, Self::Error> {
		let roles: Vec<Role> = record.messages.iter().map(|message| message.role).collect();

		if roles != [Role::System, Role::User, Role::Assistant] {
			return Err(format!("expected system, user, assistant messages, found {roles:?}"));
		}

		let mut contents = record.messages.into_iter().map(|message| message.content);
		let (Some(system), Some(user), Some(assistant)) =
			(contents.next(), contents.next(), contents.next())
		else {
			return Err("missing message content".to_string());
		};

		Ok(Self { system, user, assistant })
	}
}
