//! Marker creation form.
//!
//! The form is transient: it exists from the moment a click lands on a page
//! until the user submits or cancels. Type and location are picked from open
//! option sets that grow as markers are created, with an "add new" entry that
//! takes free text. Purpose cycles through the closed [`Purpose`] set.

use crate::coords::PagePoint;
use crate::marker::MarkerDraft;
use crate::purpose::Purpose;

/// Ordered, de-duplicated set of user-entered values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    values: Vec<String>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for value in values {
            set.observe(value.as_ref());
        }
        set
    }

    /// Record a value seen in use. Blank values and duplicates are ignored.
    /// Returns true when the set grew.
    pub fn observe(&mut self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || self.contains(value) {
            return false;
        }
        self.values.push(value.to_string());
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    pub fn position(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

/// Selection state of a type or location field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Choice {
    #[default]
    Unset,
    Existing(usize),
    New(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Quantity,
    Type,
    Location,
    Purpose,
}

impl FormField {
    const ORDER: [FormField; 4] = [
        FormField::Quantity,
        FormField::Type,
        FormField::Location,
        FormField::Purpose,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    pub fn title(self) -> &'static str {
        match self {
            FormField::Quantity => "Quantity",
            FormField::Type => "Type",
            FormField::Location => "Location",
            FormField::Purpose => "Purpose",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Select or enter a cable type")]
    MissingType,
    #[error("Select or enter a location")]
    MissingLocation,
}

impl FormError {
    pub fn field(&self) -> FormField {
        match self {
            FormError::InvalidQuantity => FormField::Quantity,
            FormError::MissingType => FormField::Type,
            FormError::MissingLocation => FormField::Location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkerForm {
    position: PagePoint,
    quantity: u32,
    kind: Choice,
    location: Choice,
    purpose: Purpose,
    type_options: OptionSet,
    location_options: OptionSet,
    focus: FormField,
    error: Option<FormError>,
}

impl MarkerForm {
    pub fn open(
        position: PagePoint,
        type_options: OptionSet,
        location_options: OptionSet,
        default_purpose: Purpose,
    ) -> Self {
        Self {
            position,
            quantity: 1,
            kind: Choice::Unset,
            location: Choice::Unset,
            purpose: default_purpose,
            type_options,
            location_options,
            focus: FormField::Quantity,
            error: None,
        }
    }

    pub fn position(&self) -> PagePoint {
        self.position
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    pub fn focus(&self) -> FormField {
        self.focus
    }

    pub fn error(&self) -> Option<&FormError> {
        self.error.as_ref()
    }

    pub fn type_choice(&self) -> &Choice {
        &self.kind
    }

    pub fn location_choice(&self) -> &Choice {
        &self.location
    }

    pub fn type_options(&self) -> &OptionSet {
        &self.type_options
    }

    pub fn location_options(&self) -> &OptionSet {
        &self.location_options
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    pub fn set_focus(&mut self, field: FormField) {
        self.focus = field;
    }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }

    pub fn increment_quantity(&mut self) {
        self.quantity = self.quantity.saturating_add(1);
    }

    pub fn decrement_quantity(&mut self) {
        self.quantity = self.quantity.saturating_sub(1).max(1);
    }

    pub fn set_purpose(&mut self, purpose: Purpose) {
        self.purpose = purpose;
    }

    /// Pick a type by value: existing options are selected, anything else
    /// becomes a new entry.
    pub fn choose_type(&mut self, value: &str) {
        self.kind = Self::choice_for(&self.type_options, value);
    }

    pub fn choose_location(&mut self, value: &str) {
        self.location = Self::choice_for(&self.location_options, value);
    }

    fn choice_for(options: &OptionSet, value: &str) -> Choice {
        match options.position(value) {
            Some(idx) => Choice::Existing(idx),
            None => Choice::New(value.to_string()),
        }
    }

    /// Move the focused field's selection forward or backward.
    /// Type/location cycle through their options followed by "add new".
    pub fn cycle(&mut self, forward: bool) {
        match self.focus {
            FormField::Quantity => {
                if forward {
                    self.increment_quantity();
                } else {
                    self.decrement_quantity();
                }
            }
            FormField::Type => {
                self.kind = Self::cycle_choice(&self.kind, &self.type_options, forward);
            }
            FormField::Location => {
                self.location = Self::cycle_choice(&self.location, &self.location_options, forward);
            }
            FormField::Purpose => {
                self.purpose = if forward {
                    self.purpose.next()
                } else {
                    self.purpose.prev()
                };
            }
        }
    }

    fn cycle_choice(current: &Choice, options: &OptionSet, forward: bool) -> Choice {
        // Slots: 0..len are existing options, len is "add new".
        let slots = options.len() + 1;
        let current_slot = match current {
            Choice::Unset => None,
            Choice::Existing(idx) => Some(*idx),
            Choice::New(_) => Some(options.len()),
        };
        let next_slot = match (current_slot, forward) {
            (None, true) => 0,
            (None, false) => slots - 1,
            (Some(slot), true) => (slot + 1) % slots,
            (Some(slot), false) => (slot + slots - 1) % slots,
        };
        if next_slot == options.len() {
            match current {
                Choice::New(text) => Choice::New(text.clone()),
                _ => Choice::New(String::new()),
            }
        } else {
            Choice::Existing(next_slot)
        }
    }

    /// Text input on the focused field. Digits edit the quantity; other
    /// characters on type/location switch to a new entry and append.
    pub fn input_char(&mut self, c: char) {
        match self.focus {
            FormField::Quantity => {
                if let Some(digit) = c.to_digit(10) {
                    self.quantity = self.quantity.saturating_mul(10).saturating_add(digit);
                }
            }
            FormField::Type => Self::append_text(&mut self.kind, c),
            FormField::Location => Self::append_text(&mut self.location, c),
            FormField::Purpose => {}
        }
    }

    pub fn backspace(&mut self) {
        match self.focus {
            FormField::Quantity => self.quantity /= 10,
            FormField::Type => Self::pop_text(&mut self.kind),
            FormField::Location => Self::pop_text(&mut self.location),
            FormField::Purpose => {}
        }
    }

    fn append_text(choice: &mut Choice, c: char) {
        match choice {
            Choice::New(text) => text.push(c),
            _ => *choice = Choice::New(c.to_string()),
        }
    }

    fn pop_text(choice: &mut Choice) {
        if let Choice::New(text) = choice {
            text.pop();
        }
    }

    /// Resolved type value, if any.
    pub fn type_value(&self) -> Option<&str> {
        Self::resolve(&self.kind, &self.type_options)
    }

    pub fn location_value(&self) -> Option<&str> {
        Self::resolve(&self.location, &self.location_options)
    }

    fn resolve<'a>(choice: &'a Choice, options: &'a OptionSet) -> Option<&'a str> {
        let value = match choice {
            Choice::Unset => return None,
            Choice::Existing(idx) => options.get(*idx)?,
            Choice::New(text) => text.as_str(),
        };
        let value = value.trim();
        if value.is_empty() { None } else { Some(value) }
    }

    /// Validate and produce a draft. On failure the error is kept on the form
    /// and focus moves to the offending field.
    pub fn submit(&mut self) -> Result<MarkerDraft, FormError> {
        let result = self.validate();
        match &result {
            Ok(_) => self.error = None,
            Err(e) => {
                self.focus = e.field();
                self.error = Some(e.clone());
            }
        }
        result
    }

    fn validate(&self) -> Result<MarkerDraft, FormError> {
        if self.quantity == 0 {
            return Err(FormError::InvalidQuantity);
        }
        let kind = self.type_value().ok_or(FormError::MissingType)?;
        let location = self.location_value().ok_or(FormError::MissingLocation)?;

        Ok(MarkerDraft {
            x: self.position.x,
            y: self.position.y,
            page_index: self.position.page_index,
            quantity: self.quantity,
            kind: kind.to_string(),
            location: location.to_string(),
            purpose: self.purpose.as_str().to_string(),
        })
    }
}
