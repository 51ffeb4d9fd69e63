//! Token, zone and marker handlers.
//!
//! Every membership change builds the proposed contents of the destination
//! zone, runs the stacking gate on them and only then commits. A failed
//! gate leaves the working state exactly as it was.

use im::Vector;
use tracing::debug;

use super::effect::EffectKind;
use super::interpreter::Interpreter;
use crate::core::{MarkerLatticeDef, ScalarValue, Token, TokenId, Value, ValueType, ZoneId};
use crate::error::{KernelError, ReferenceKind};
use crate::eval::{eval_int, eval_query, eval_value, Bindings, Query, TokenFilter, ValueExpr};
use crate::selectors::{resolve_single_zone_sel, resolve_token_id, TokenSel, ZoneSel};
use crate::stacking::check_stacking_constraints;
use crate::triggers::TriggerEvent;
use crate::zones::{insert_token, locate_token, take_token, zone_tokens, ZonePosition};

impl Interpreter<'_> {
    /// Reject the proposed contents of `zone` if any constraint is violated.
    pub(crate) fn gate(&self, zone: &ZoneId, proposed: &Vector<Token>) -> Result<(), KernelError> {
        if self.def.stacking_constraints.is_empty() {
            return Ok(());
        }
        let proposed: Vec<Token> = proposed.iter().cloned().collect();
        let violation = check_stacking_constraints(
            &self.def.stacking_constraints,
            &self.def.zones,
            zone,
            &proposed,
            &self.type_factions,
        )
        .into_iter()
        .next();
        match violation {
            Some(violation) => {
                debug!(constraint = %violation.constraint_id, zone = %zone, "stacking gate rejected placement");
                Err(KernelError::StackingViolation(violation))
            }
            None => Ok(()),
        }
    }

    pub(crate) fn create_token(
        &mut self,
        token_type: &str,
        zone: &ZoneSel,
        position: ZonePosition,
        props: &[(String, ValueExpr)],
        bind: Option<&str>,
        bindings: &mut Bindings,
    ) -> Result<(), KernelError> {
        let game = self.def;
        let type_def = game.token_type(token_type).ok_or_else(|| {
            KernelError::unknown(
                ReferenceKind::TokenType,
                token_type,
                game.token_types.iter().map(|t| t.id.clone()),
            )
        })?;

        let (id, ordinal) = self.state.mint_token_id(token_type);
        let (zone, token) = {
            let ctx = self.eval_ctx(bindings);
            let zone = resolve_single_zone_sel(zone, &ctx)?;
            let mut token = Token {
                id,
                token_type: token_type.to_string(),
                props: type_def.props.clone(),
            };
            for (key, expr) in props {
                if key == "id" || key == "type" {
                    return Err(KernelError::invalid_effect(
                        EffectKind::CreateToken,
                        format!("`{key}` cannot be set as a property"),
                    ));
                }
                token.props.insert(key.clone(), eval_value(expr, &ctx)?);
            }
            (zone, token)
        };

        let mut proposed = zone_tokens(&self.state, &zone)?.clone();
        let rng = insert_token(&mut proposed, token.clone(), position, &self.state.rng)?;
        self.gate(&zone, &proposed)?;

        self.state.zones.insert(zone.clone(), proposed);
        self.state.rng = rng;
        self.state.next_token_ordinal = ordinal + 1;
        self.events.push(TriggerEvent::TokenEntered {
            zone,
            token: token.id.clone(),
        });
        if let Some(name) = bind {
            bindings.insert(name.to_string(), Value::Token(token));
        }
        Ok(())
    }

    pub(crate) fn destroy_token(&mut self, token: &TokenSel, bindings: &Bindings) -> Result<(), KernelError> {
        let id = resolve_token_id(token, &self.eval_ctx(bindings))?;
        take_token(&mut self.state, &id)?;
        Ok(())
    }

    pub(crate) fn move_token(
        &mut self,
        token: &TokenSel,
        from: Option<&ZoneSel>,
        to: &ZoneSel,
        position: ZonePosition,
        bindings: &Bindings,
    ) -> Result<(), KernelError> {
        let (id, source, dest) = self.resolve_move(EffectKind::MoveToken, token, from, to, bindings)?;
        self.relocate(&id, &source, &dest, position)
    }

    pub(crate) fn move_token_adjacent(
        &mut self,
        token: &TokenSel,
        from: Option<&ZoneSel>,
        to: &ZoneSel,
        bindings: &Bindings,
    ) -> Result<(), KernelError> {
        let (id, source, dest) = self.resolve_move(EffectKind::MoveTokenAdjacent, token, from, to, bindings)?;
        if !self.def.are_adjacent(&source, &dest) {
            return Err(KernelError::invalid_effect(
                EffectKind::MoveTokenAdjacent,
                format!("`{dest}` is not adjacent to `{source}`"),
            ));
        }
        self.relocate(&id, &source, &dest, ZonePosition::Top)
    }

    /// Token id, its current zone and the destination of a single move.
    fn resolve_move(
        &self,
        kind: EffectKind,
        token: &TokenSel,
        from: Option<&ZoneSel>,
        to: &ZoneSel,
        bindings: &Bindings,
    ) -> Result<(TokenId, ZoneId, ZoneId), KernelError> {
        let ctx = self.eval_ctx(bindings);
        let id = resolve_token_id(token, &ctx)?;
        let location = locate_token(&self.state, &id)?;
        if let Some(from) = from {
            let expected = resolve_single_zone_sel(from, &ctx)?;
            if expected != location.zone {
                return Err(KernelError::invalid_effect(
                    kind,
                    format!("token `{id}` is in `{}`, not `{expected}`", location.zone),
                ));
            }
        }
        let dest = resolve_single_zone_sel(to, &ctx)?;
        Ok((id, location.zone, dest))
    }

    /// Move one token, gating the destination.
    fn relocate(&mut self, id: &TokenId, source: &ZoneId, dest: &ZoneId, position: ZonePosition) -> Result<(), KernelError> {
        let location = locate_token(&self.state, id)?;
        let mut dest_tokens = zone_tokens(&self.state, dest)?.clone();

        if source == dest {
            let token = dest_tokens.remove(location.index);
            let rng = insert_token(&mut dest_tokens, token, position, &self.state.rng)?;
            self.gate(dest, &dest_tokens)?;
            self.state.zones.insert(dest.clone(), dest_tokens);
            self.state.rng = rng;
            return Ok(());
        }

        let mut source_tokens = zone_tokens(&self.state, source)?.clone();
        let token = source_tokens.remove(location.index);
        let rng = insert_token(&mut dest_tokens, token, position, &self.state.rng)?;
        self.gate(dest, &dest_tokens)?;

        self.state.zones.insert(source.clone(), source_tokens);
        self.state.zones.insert(dest.clone(), dest_tokens);
        self.state.rng = rng;
        self.events.push(TriggerEvent::TokenEntered {
            zone: dest.clone(),
            token: id.clone(),
        });
        Ok(())
    }

    pub(crate) fn move_all(
        &mut self,
        from: &ZoneSel,
        to: &ZoneSel,
        filter: &[TokenFilter],
        bindings: &Bindings,
    ) -> Result<(), KernelError> {
        let (source, dest, moving) = {
            let ctx = self.eval_ctx(bindings);
            let source = resolve_single_zone_sel(from, &ctx)?;
            let dest = resolve_single_zone_sel(to, &ctx)?;
            let query = Query::TokensInZone {
                zone: ZoneSel::Literal(source.clone()),
                filter: filter.to_vec(),
            };
            let moving: Vec<TokenId> = eval_query(&query, &ctx)?
                .into_iter()
                .filter_map(|item| match item {
                    Value::Token(token) => Some(token.id),
                    _ => None,
                })
                .collect();
            (source, dest, moving)
        };
        if source == dest || moving.is_empty() {
            zone_tokens(&self.state, &dest)?;
            return Ok(());
        }

        let (kept, moved): (Vector<Token>, Vector<Token>) = zone_tokens(&self.state, &source)?
            .iter()
            .cloned()
            .partition(|t| !moving.contains(&t.id));
        let mut dest_tokens = moved;
        dest_tokens.append(zone_tokens(&self.state, &dest)?.clone());
        self.gate(&dest, &dest_tokens)?;

        self.state.zones.insert(source, kept);
        self.state.zones.insert(dest.clone(), dest_tokens);
        for id in moving {
            self.events.push(TriggerEvent::TokenEntered {
                zone: dest.clone(),
                token: id,
            });
        }
        Ok(())
    }

    pub(crate) fn draw(
        &mut self,
        from: &ZoneSel,
        to: &ZoneSel,
        count: &ValueExpr,
        bindings: &Bindings,
    ) -> Result<(), KernelError> {
        let (source, dest, count) = {
            let ctx = self.eval_ctx(bindings);
            (
                resolve_single_zone_sel(from, &ctx)?,
                resolve_single_zone_sel(to, &ctx)?,
                eval_int(count, &ctx)?,
            )
        };
        if count < 0 {
            return Err(KernelError::invalid_effect(
                EffectKind::Draw,
                format!("count must not be negative, got {count}"),
            ));
        }
        let mut source_tokens = zone_tokens(&self.state, &source)?.clone();
        let mut dest_tokens = zone_tokens(&self.state, &dest)?.clone();
        if source == dest {
            return Ok(());
        }

        let mut drawn = Vec::new();
        let wanted = usize::try_from(count).unwrap_or(usize::MAX);
        while drawn.len() < wanted {
            let Some(token) = source_tokens.pop_front() else {
                break;
            };
            drawn.push(token.id.clone());
            dest_tokens.push_front(token);
        }
        if drawn.is_empty() {
            return Ok(());
        }
        self.gate(&dest, &dest_tokens)?;

        self.state.zones.insert(source, source_tokens);
        self.state.zones.insert(dest.clone(), dest_tokens);
        for id in drawn {
            self.events.push(TriggerEvent::TokenEntered {
                zone: dest.clone(),
                token: id,
            });
        }
        Ok(())
    }

    pub(crate) fn shuffle(&mut self, zone: &ZoneSel, bindings: &Bindings) -> Result<(), KernelError> {
        let zone = resolve_single_zone_sel(zone, &self.eval_ctx(bindings))?;
        let mut tokens: Vec<Token> = zone_tokens(&self.state, &zone)?.iter().cloned().collect();
        let rng = self.state.rng.shuffle(&mut tokens)?;
        self.state.zones.insert(zone, tokens.into_iter().collect());
        self.state.rng = rng;
        Ok(())
    }

    pub(crate) fn set_token_prop(
        &mut self,
        token: &TokenSel,
        prop: &str,
        value: &ValueExpr,
        bindings: &Bindings,
    ) -> Result<(), KernelError> {
        if prop == "id" || prop == "type" {
            return Err(KernelError::invalid_effect(
                EffectKind::SetTokenProp,
                format!("`{prop}` is read-only"),
            ));
        }
        let (id, value) = {
            let ctx = self.eval_ctx(bindings);
            (resolve_token_id(token, &ctx)?, eval_value(value, &ctx)?)
        };
        let location = locate_token(&self.state, &id)?;
        if let Some(token) = self
            .state
            .zones
            .get_mut(&location.zone)
            .and_then(|tokens| tokens.get_mut(location.index))
        {
            token.props.insert(prop.to_string(), value);
        }
        Ok(())
    }

    // === Markers ===

    pub(crate) fn set_marker(
        &mut self,
        zone: &ZoneSel,
        marker: &str,
        state: &ValueExpr,
        bindings: &Bindings,
    ) -> Result<(), KernelError> {
        let lattice = self.zone_lattice(marker)?;
        let (zone, label) = {
            let ctx = self.eval_ctx(bindings);
            (resolve_single_zone_sel(zone, &ctx)?, eval_value(state, &ctx)?)
        };
        let label = lattice_label(lattice, label)?;
        self.write_zone_marker(zone, marker, label);
        Ok(())
    }

    pub(crate) fn shift_marker(
        &mut self,
        zone: &ZoneSel,
        marker: &str,
        delta: &ValueExpr,
        bindings: &Bindings,
    ) -> Result<(), KernelError> {
        let lattice = self.zone_lattice(marker)?;
        let (zone, delta) = {
            let ctx = self.eval_ctx(bindings);
            (resolve_single_zone_sel(zone, &ctx)?, eval_int(delta, &ctx)?)
        };
        if lattice.states.is_empty() {
            return Err(KernelError::invalid_effect(
                EffectKind::ShiftMarker,
                format!("marker `{marker}` has no states"),
            ));
        }
        let current = self
            .state
            .zone_marker(&zone, marker)
            .unwrap_or(lattice.default_state.as_str());
        let position = lattice.position(current).unwrap_or(0) as i64;
        let last = lattice.states.len() as i64 - 1;
        let shifted = position.saturating_add(delta).clamp(0, last) as usize;
        let label = lattice.states[shifted].clone();
        self.write_zone_marker(zone, marker, label);
        Ok(())
    }

    pub(crate) fn set_global_marker(&mut self, marker: &str, state: &ValueExpr, bindings: &Bindings) -> Result<(), KernelError> {
        let game = self.def;
        let lattice = game.global_marker_lattice(marker).ok_or_else(|| {
            KernelError::unknown(
                ReferenceKind::MarkerLattice,
                marker,
                game.global_marker_lattices.iter().map(|m| m.id.clone()),
            )
        })?;
        let label = eval_value(state, &self.eval_ctx(bindings))?;
        let label = lattice_label(lattice, label)?;
        self.state.global_markers.insert(marker.to_string(), label);
        Ok(())
    }

    fn zone_lattice(&self, marker: &str) -> Result<&'_ MarkerLatticeDef, KernelError> {
        let game = self.def;
        game.marker_lattice(marker).ok_or_else(|| {
            KernelError::unknown(
                ReferenceKind::MarkerLattice,
                marker,
                game.marker_lattices.iter().map(|m| m.id.clone()),
            )
        })
    }

    fn write_zone_marker(&mut self, zone: ZoneId, marker: &str, label: String) {
        let mut markers = self.state.zone_markers.get(&zone).cloned().unwrap_or_default();
        markers.insert(marker.to_string(), label);
        self.state.zone_markers.insert(zone, markers);
    }
}

/// Validate a marker label against its lattice.
fn lattice_label(lattice: &MarkerLatticeDef, value: ScalarValue) -> Result<String, KernelError> {
    match value {
        ScalarValue::Str(label) if lattice.position(&label).is_some() => Ok(label),
        ScalarValue::Str(label) => Err(KernelError::unknown(
            ReferenceKind::MarkerState,
            label,
            lattice.states.iter().cloned(),
        )),
        other => Err(KernelError::type_mismatch(
            ValueType::Str,
            other.value_type(),
            format!("marker `{}`", lattice.id),
        )),
    }
}
