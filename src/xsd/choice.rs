//! xs:choice behaviour for [`XsdGroup`]
//!
//! Parsing is greedy: every alternative is tried against its own copy of
//! the remaining input and the one consuming the most leading elements
//! wins. Ties keep the alternative declared first. There is no
//! backtracking across occurrences.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::documents::Element;
use crate::error::{ChoiceError, Result};
use crate::values::{Kwargs, Value, ValueMap};

use super::groups::XsdGroup;
use super::particles::{ParseState, Particle};
use super::schemas::Schema;

impl XsdGroup {
    pub(super) fn parse_choice(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &Schema,
        state: &mut ParseState,
    ) -> Result<Value> {
        let mut result = Vec::new();

        for occurrence in self.occurs.iter() {
            if xmlelements.is_empty() {
                break;
            }

            let mut best: Option<(usize, Value)> = None;
            for (name, element) in self.nested_elements()? {
                let mut local = xmlelements.clone();
                let sub_result =
                    element.parse_xmlelements_with(&mut local, schema, name.as_deref(), state)?;
                let consumed = xmlelements.len() - local.len();
                if consumed == 0 {
                    continue;
                }

                let candidate = match name {
                    Some(name) if !(element.is_container() && !element.accepts_multiple()) => {
                        Value::map([(name.as_str(), sub_result)])
                    }
                    _ => sub_result,
                };

                // Strictly greater: an equal later candidate never displaces
                if best.as_ref().map_or(true, |(most, _)| consumed > *most) {
                    best = Some((consumed, candidate));
                }
            }

            match best {
                Some((consumed, candidate)) => {
                    trace!(occurrence, consumed, "choice alternative selected");
                    xmlelements.drain(..consumed);
                    result.push(candidate);
                }
                None => break,
            }
        }

        if self.accepts_multiple() {
            Ok(Value::List(result))
        } else {
            Ok(result.into_iter().next().unwrap_or(Value::Null))
        }
    }

    pub(super) fn parse_choice_kwargs(
        &self,
        kwargs: &mut Kwargs,
        name: Option<&str>,
    ) -> Result<Option<ValueMap>> {
        let result = match name {
            Some(name) if kwargs.contains_key(name) => {
                let supplied = kwargs.shift_remove(name).unwrap_or_default();

                let mut chosen = Vec::new();
                for item in supplied.into_occurrences() {
                    match self.match_alternative(&item, name)? {
                        Some(value) => chosen.push(value),
                        None => {
                            let signature = self.choice_signature(0)?;
                            return Err(ChoiceError::new(Some(name), signature)
                                .with_instance(item.to_string())
                                .into());
                        }
                    }
                }

                if self.accepts_multiple() {
                    Value::List(chosen)
                } else {
                    chosen.into_iter().next().unwrap_or(Value::Null)
                }
            }
            _ => {
                // Alternatives given directly cannot express repetition
                if self.accepts_multiple() {
                    return Ok(Some(ValueMap::new()));
                }

                let mut bound = ValueMap::new();
                for alternative in &self.particles {
                    let mut trial = kwargs.clone();
                    if let Some(value) = alternative.parse_kwargs(&mut trial, None)? {
                        if !value.is_empty() {
                            *kwargs = trial;
                            bound = value;
                            break;
                        }
                    }
                }

                match name {
                    Some(_) if bound.is_empty() => Value::Null,
                    Some(_) => Value::Map(bound),
                    None => return Ok(Some(bound)),
                }
            }
        };

        Ok(name.map(|name| ValueMap::from([(name.to_string(), result)])))
    }

    /// First alternative whose shape fits the supplied item
    fn match_alternative(&self, item: &Value, name: &str) -> Result<Option<Value>> {
        for alternative in &self.particles {
            let alternative = alternative.resolved()?;
            if alternative.is_container() {
                let choice_value = item.get(name).unwrap_or(item);
                if alternative.accept(choice_value)? {
                    return Ok(Some(choice_value.clone()));
                }
            } else if let Some(leaf_name) = alternative.name() {
                if let Some(value) = item.get(leaf_name) {
                    return Ok(Some(Value::map([(leaf_name, value.clone())])));
                }
            }
        }
        Ok(None)
    }

    pub(super) fn render_choice(&self, parent: &mut Element, value: &Value) -> Result<()> {
        let items = if self.accepts_multiple() {
            value.occurrences()
        } else {
            vec![value]
        };

        for item in items {
            let mut rendered = false;
            for (name, element) in self.nested_elements()? {
                if let Particle::Element(decl) = element {
                    if let Some(choice_value) = item.get(decl.name()) {
                        element.render(parent, choice_value)?;
                        rendered = true;
                        break;
                    }
                    continue;
                }

                let choice_value = match name {
                    Some(name) => item.get(name).unwrap_or(item),
                    None => item,
                };
                if element.accept(choice_value)? {
                    element.render(parent, choice_value)?;
                    rendered = true;
                    break;
                }
            }

            if !rendered {
                debug!(item = %item, "no choice alternative matches, item skipped");
            }
        }
        Ok(())
    }

    pub(super) fn choice_signature(&self, depth: usize) -> Result<String> {
        let mut parts = Vec::new();
        for (name, element) in self.nested_elements()? {
            if element.is_container() {
                parts.push(format!("{{{}}}", element.signature(depth)?));
            } else {
                parts.push(format!(
                    "{{{}: {}}}",
                    name.as_deref().unwrap_or_default(),
                    element.signature(depth)?
                ));
            }
        }
        let part = format!("({})", parts.join(" | "));

        if self.accepts_multiple() {
            Ok(format!("{}[]", part))
        } else {
            Ok(part)
        }
    }
}
