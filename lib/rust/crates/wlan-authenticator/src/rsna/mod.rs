// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::device::ReasonCode;
use crate::key::{gtk::Gtk, ptk::Ptk};
use std::time::Duration;

#[cfg(test)]
pub mod test_util;

#[derive(Debug, PartialEq)]
pub enum Key {
    Ptk(Ptk),
    Gtk(u8, Gtk),
}

/// Side effects requested by a state machine transition. They are carried out by the
/// `Authenticator` once the transition returned.
#[derive(Debug, PartialEq)]
pub enum SecAssocUpdate {
    TxEapolKeyFrame(Vec<u8>),
    Key(Key),
    RemovePtk,
    ScheduleEapolTimeout(Duration),
    CancelEapolTimeout,
    SchedulePtkRekey(Duration),
    CancelPtkRekey,
    Disassociate(ReasonCode),
}

pub type UpdateSink = Vec<SecAssocUpdate>;
